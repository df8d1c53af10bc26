use super::payload::Payload;
use crate::core::error::{ChatError, Device, DeviceError};
use std::path::Path;

/// Reads a user-selected image in full and wraps it as a payload. The file
/// being an image is the caller's responsibility; only the mime is inferred.
pub async fn read_image(path: &Path) -> Result<Payload, ChatError> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| DeviceError::access(Device::File, format!("{}: {}", path.display(), e)))?;
    let mime = image_mime(path, &data);
    tracing::debug!("Read {} bytes of {} from {:?}", data.len(), mime, path);
    Ok(Payload::new(mime, data))
}

/// Extension first, then the file's magic bytes when the extension says
/// nothing about an image.
fn image_mime(path: &Path, data: &[u8]) -> String {
    let guessed = mime_guess::from_path(path).first_raw();
    if let Some(mime) = guessed.filter(|m| m.starts_with("image/")) {
        return mime.to_string();
    }
    match image::guess_format(data) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) => guessed.unwrap_or("application/octet-stream").to_string(),
    }
}
