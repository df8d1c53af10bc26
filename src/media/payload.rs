//! Self-contained payloads carried in the `message` field of image and audio
//! frames, encoded as `data:<mime>;base64,<data>` URLs.

use crate::core::error::ProtocolError;
use base64::{Engine as _, engine::general_purpose::STANDARD};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    mime: String,
    data: Vec<u8>,
}

impl Payload {
    pub fn new(mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            data,
        }
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    pub fn is_audio(&self) -> bool {
        self.mime.starts_with("audio/")
    }

    /// File extension matching the mime, used when the host stores payloads.
    pub fn extension(&self) -> &'static str {
        if let Some(format) = image::ImageFormat::from_mime_type(&self.mime) {
            if let Some(extension) = format.extensions_str().first() {
                return *extension;
            }
        }
        mime_guess::get_mime_extensions_str(&self.mime)
            .and_then(|extensions| extensions.first())
            .copied()
            .unwrap_or("bin")
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.data))
    }

    pub fn from_data_url(url: &str) -> Result<Self, ProtocolError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| ProtocolError::InvalidPayload("not a data URL".into()))?;
        let (header, encoded) = rest
            .split_once(',')
            .ok_or_else(|| ProtocolError::InvalidPayload("data URL has no body".into()))?;
        let mime = header.strip_suffix(";base64").ok_or_else(|| {
            ProtocolError::InvalidPayload("only base64 data URLs are supported".into())
        })?;
        if mime.is_empty() {
            return Err(ProtocolError::InvalidPayload("data URL has no mime type".into()));
        }
        let data = STANDARD
            .decode(encoded)
            .map_err(|e| ProtocolError::InvalidPayload(e.to_string()))?;
        Ok(Self::new(mime, data))
    }
}
