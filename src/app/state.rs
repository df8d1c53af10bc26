use crate::core::session::ChatSession;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tab {
    Overview,
    Chat,
}

#[derive(Debug, Default)]
pub struct ChatInputs {
    pub username_input: String,
    pub message_to_send: String,
    pub album_path: String,
    pub record_pressed: bool,
}

/// Represents the various states of the application's lifecycle.
pub enum AppState {
    Startup,
    StartupFailed {
        error: String,
    },
    Ready {
        session: ChatSession,
        inputs: ChatInputs,
        active_tab: Tab,
    },
}
