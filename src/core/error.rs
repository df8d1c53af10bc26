use crate::models::message::MessageKind;
use std::fmt;
use tokio_tungstenite::tungstenite;

/// Failure to turn an inbound frame into a [`ChatMessage`].
///
/// [`ChatMessage`]: crate::models::message::ChatMessage
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame has an empty username")]
    EmptySender,

    #[error("{kind} frame does not carry a matching payload")]
    PayloadMismatch { kind: MessageKind },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Device {
    Camera,
    Microphone,
    File,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Device::Camera => "camera",
            Device::Microphone => "microphone",
            Device::File => "file",
        })
    }
}

/// Permission denied, device absent, or the device failed mid-capture.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no {0} backend is available")]
    Unavailable(Device),

    #[error("{device} access failed: {reason}")]
    Access { device: Device, reason: String },
}

impl DeviceError {
    pub fn access(device: Device, reason: impl fmt::Display) -> Self {
        DeviceError::Access {
            device,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("no open channel")]
    ConnectionUnavailable,

    #[error("background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ChatError::from(DeviceError::Unavailable(Device::Camera));
        assert_eq!(err.to_string(), "no camera backend is available");

        let err = ChatError::from(DeviceError::access(Device::Microphone, "permission denied"));
        assert_eq!(err.to_string(), "microphone access failed: permission denied");

        let err = ChatError::from(ProtocolError::PayloadMismatch {
            kind: MessageKind::Image,
        });
        assert_eq!(err.to_string(), "image frame does not carry a matching payload");

        assert_eq!(ChatError::ConnectionUnavailable.to_string(), "no open channel");
    }
}
