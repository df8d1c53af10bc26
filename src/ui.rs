pub mod app_layout;
pub mod chat;
pub mod fonts;
pub mod overview;
