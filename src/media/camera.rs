use super::{DeviceGuard, Frame, VideoSource, payload::Payload};
use crate::core::error::ChatError;
use image::{ImageFormat, RgbaImage};
use std::{io::Cursor, time::Duration};

/// Takes one photo: acquire the camera, let it settle, grab a frame, release
/// the camera, then encode the frame as a PNG payload.
pub async fn capture_photo(source: &dyn VideoSource, settle: Duration) -> Result<Payload, ChatError> {
    let mut stream = DeviceGuard::new(source.acquire().await?);
    let (width, height) = stream.resolution();
    tracing::debug!("Camera stream acquired at {}x{}", width, height);

    stream.wait_for_frame(settle).await?;
    let frame = stream.grab_frame().await;
    stream.release();

    encode_png(frame?)
}

pub fn encode_png(frame: Frame) -> Result<Payload, ChatError> {
    let Frame {
        width,
        height,
        rgba,
    } = frame;
    let image = RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
        ChatError::Encode(format!("frame buffer does not match {width}x{height}"))
    })?;

    let mut png = Cursor::new(Vec::new());
    image
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|e| ChatError::Encode(e.to_string()))?;
    Ok(Payload::new("image/png", png.into_inner()))
}
