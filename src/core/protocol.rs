//! Wire codec for chat frames.
//!
//! A frame is one JSON object `{ "username", "message", "timestamp", "type" }`.
//! Both directions use the same shape, so any two participants running this
//! codec (or the web dispatch page) interoperate.

use crate::{
    core::error::ProtocolError,
    media::payload::Payload,
    models::message::{ChatMessage, MessageKind},
};

pub fn encode(message: &ChatMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

/// Decodes one inbound frame. No partial recovery is attempted.
///
/// The payload of an image or audio frame is not inspected here: peers may
/// send content this client cannot render (the web page records voice as a
/// `blob:` URL), and such frames still belong in the log.
pub fn decode(frame: &[u8]) -> Result<ChatMessage, ProtocolError> {
    let message: ChatMessage = serde_json::from_slice(frame)?;
    if message.sender.is_empty() {
        return Err(ProtocolError::EmptySender);
    }
    Ok(message)
}

/// Outbound check: an image frame carries an `image/*` payload and an audio
/// frame an `audio/*` one.
pub fn check_payload(kind: MessageKind, payload: &Payload) -> Result<(), ProtocolError> {
    let matches = match kind {
        MessageKind::Text => false,
        MessageKind::Image => payload.is_image(),
        MessageKind::Audio => payload.is_audio(),
    };
    if matches {
        Ok(())
    } else {
        Err(ProtocolError::PayloadMismatch { kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(sender: &str, content: &str) -> ChatMessage {
        ChatMessage {
            sender: sender.into(),
            content: content.into(),
            timestamp: "3/7/2024, 3:04:05 PM".into(),
            kind: MessageKind::Text,
        }
    }

    #[test]
    fn encodes_wire_field_names() {
        let frame = encode(&text("Dispatcher", "Unit en route")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["username"], "Dispatcher");
        assert_eq!(value["message"], "Unit en route");
        assert_eq!(value["timestamp"], "3/7/2024, 3:04:05 PM");
        assert_eq!(value["type"], "text");
        assert_eq!(value.as_object().unwrap().len(), 4);
    }

    #[test]
    fn round_trips_every_kind() {
        let image = Payload::new("image/png", vec![0x89, b'P', b'N', b'G']);
        let audio = Payload::new("audio/wav", b"RIFF".to_vec());
        let messages = [
            text("Dispatcher", "Unit en route"),
            text("Field1", "  padded \"quotes\" and ünïcode  "),
            ChatMessage::now("Field1", MessageKind::Image, image.to_data_url()),
            ChatMessage::now("Field2", MessageKind::Audio, audio.to_data_url()),
        ];
        for message in messages {
            let frame = encode(&message).unwrap();
            assert_eq!(decode(frame.as_bytes()).unwrap(), message);
        }
    }

    #[test]
    fn decodes_frame_from_web_page() {
        let frame = br#"{"username":"Field1","message":"On scene","timestamp":"1/2/2024, 9:00:00 AM","type":"text"}"#;
        let message = decode(frame).unwrap();
        assert_eq!(message.sender, "Field1");
        assert_eq!(message.kind, MessageKind::Text);
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(decode(b"not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(
            decode(br#"{"username":"a","message":"b","type":"text"}"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            decode(br#"{"username":"a","message":"b","timestamp":"t","type":"video"}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_empty_sender() {
        let frame = encode(&text("", "hi")).unwrap();
        assert!(matches!(
            decode(frame.as_bytes()),
            Err(ProtocolError::EmptySender)
        ));
    }

    #[test]
    fn keeps_frames_with_unrenderable_payloads() {
        let frame = br#"{"username":"Field1","message":"blob:https://dispatch.example/4f1c","timestamp":"1/2/2024, 9:00:05 AM","type":"audio"}"#;
        let message = decode(frame).unwrap();
        assert_eq!(message.kind, MessageKind::Audio);
        assert_eq!(message.content, "blob:https://dispatch.example/4f1c");

        let upload = Payload::new("application/octet-stream", vec![1, 2, 3]).to_data_url();
        let frame = encode(&ChatMessage::now("Field1", MessageKind::Image, upload.clone())).unwrap();
        assert_eq!(decode(frame.as_bytes()).unwrap().content, upload);
    }

    #[test]
    fn outbound_payload_must_match_kind() {
        let png = Payload::new("image/png", vec![1]);
        let wav = Payload::new("audio/wav", vec![1]);
        let blob = Payload::new("application/octet-stream", vec![1]);

        assert!(check_payload(MessageKind::Image, &png).is_ok());
        assert!(check_payload(MessageKind::Audio, &wav).is_ok());
        assert!(matches!(
            check_payload(MessageKind::Image, &wav),
            Err(ProtocolError::PayloadMismatch { kind: MessageKind::Image })
        ));
        assert!(check_payload(MessageKind::Audio, &blob).is_err());
        assert!(check_payload(MessageKind::Text, &png).is_err());
    }
}
