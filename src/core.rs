pub mod connection;
pub mod error;
pub mod protocol;
pub mod session;
