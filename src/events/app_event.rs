use crate::{
    app::config::Config,
    core::{connection::ChannelId, error::ChatError},
    media::{payload::Payload, recorder::Recording},
    models::message::{ChatMessage, MessageKind},
};

#[derive(Debug)]
pub enum AppEvent {
    ConfigLoaded(Result<Config, eyre::Report>),
    Session(SessionEvent),
}

/// Completions reported back to the [`ChatSession`] by its background tasks.
///
/// [`ChatSession`]: crate::core::session::ChatSession
#[derive(Debug)]
pub enum SessionEvent {
    ChannelOpened(ChannelId),
    Inbound {
        channel: ChannelId,
        message: ChatMessage,
    },
    ChannelClosed {
        channel: ChannelId,
        reason: Option<String>,
    },
    RecordingStarted(Result<Recording, ChatError>),
    CaptureFinished {
        kind: MessageKind,
        result: Result<Payload, ChatError>,
    },
}
