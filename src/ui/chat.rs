pub mod attachment_menu;
pub mod chat_bar;
pub mod chat_log;
pub mod identity_prompt;
