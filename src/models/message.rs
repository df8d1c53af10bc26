use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Browser `toLocaleString()` shape for en-US, e.g. `10/16/2026, 3:04:05 PM`.
const TIMESTAMP_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Audio,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Audio => "audio",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the chat log. Never mutated after construction.
///
/// Field names on the wire are the ones the web dispatch page uses, so the
/// serde renames here are part of the protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "username")]
    pub sender: String,
    #[serde(rename = "message")]
    pub content: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

impl ChatMessage {
    /// Builds a message stamped with the local capture time.
    pub fn now(sender: &str, kind: MessageKind, content: String) -> Self {
        Self::at(sender, kind, content, Local::now())
    }

    pub fn at(sender: &str, kind: MessageKind, content: String, time: DateTime<Local>) -> Self {
        Self {
            sender: sender.to_string(),
            content,
            timestamp: time.format(TIMESTAMP_FORMAT).to_string(),
            kind,
        }
    }

    pub fn is_from(&self, identity: Option<&str>) -> bool {
        identity.is_some_and(|id| id == self.sender)
    }
}
