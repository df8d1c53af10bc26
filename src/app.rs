pub mod config;
pub mod reducer;
pub mod state;
