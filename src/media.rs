//! Media capture: device seams, payload encoding, and the three capture paths
//! (camera photo, album file, voice recording).

pub mod album;
pub mod camera;
#[cfg(any(feature = "native-audio", feature = "native-camera"))]
pub mod native;
pub mod payload;
pub mod recorder;

use crate::core::error::{ChatError, Device, DeviceError};
use async_trait::async_trait;
use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
    time::Duration,
};
use tokio::sync::mpsc;

/// A held camera or microphone. Released exactly once.
pub trait MediaStream: Send {
    fn release(&mut self);
}

/// One still frame, RGBA8, at the stream's native resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[async_trait]
pub trait VideoStream: MediaStream {
    fn resolution(&self) -> (u32, u32);

    /// Suspends until the stream can produce a renderable frame. Backends
    /// without a ready signal just wait out the settle delay.
    async fn wait_for_frame(&mut self, settle: Duration) -> Result<(), ChatError> {
        tokio::time::sleep(settle).await;
        Ok(())
    }

    async fn grab_frame(&mut self) -> Result<Frame, ChatError>;
}

#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn VideoStream>, ChatError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// A live microphone: raw PCM fragments arrive on `fragments` in device order.
pub struct AudioStream {
    pub format: AudioFormat,
    pub fragments: mpsc::UnboundedReceiver<Vec<i16>>,
    pub device: Box<dyn MediaStream>,
}

#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn acquire(&self) -> Result<AudioStream, ChatError>;
}

/// Scoped ownership of an acquired device; releases it on every exit path.
pub struct DeviceGuard<S: MediaStream + ?Sized> {
    stream: Box<S>,
    released: bool,
}

impl<S: MediaStream + ?Sized> DeviceGuard<S> {
    pub fn new(stream: Box<S>) -> Self {
        Self {
            stream,
            released: false,
        }
    }

    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.stream.release();
        }
    }
}

impl<S: MediaStream + ?Sized> Deref for DeviceGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.stream
    }
}

impl<S: MediaStream + ?Sized> DerefMut for DeviceGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

impl<S: MediaStream + ?Sized> Drop for DeviceGuard<S> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Stand-in used when no platform backend is compiled in.
pub struct Unavailable;

#[async_trait]
impl VideoSource for Unavailable {
    async fn acquire(&self) -> Result<Box<dyn VideoStream>, ChatError> {
        Err(DeviceError::Unavailable(Device::Camera).into())
    }
}

#[async_trait]
impl AudioSource for Unavailable {
    async fn acquire(&self) -> Result<AudioStream, ChatError> {
        Err(DeviceError::Unavailable(Device::Microphone).into())
    }
}

/// The capture devices a session may use.
#[derive(Clone)]
pub struct MediaDevices {
    pub camera: Arc<dyn VideoSource>,
    pub microphone: Arc<dyn AudioSource>,
    pub settle: Duration,
}

impl MediaDevices {
    /// Native backends for whichever of `native-camera` / `native-audio` is enabled.
    pub fn platform(camera_index: u32, settle: Duration) -> Self {
        #[cfg(feature = "native-camera")]
        let camera: Arc<dyn VideoSource> = Arc::new(native::NativeCamera::new(camera_index));
        #[cfg(not(feature = "native-camera"))]
        let camera: Arc<dyn VideoSource> = {
            let _ = camera_index;
            Arc::new(Unavailable)
        };

        #[cfg(feature = "native-audio")]
        let microphone: Arc<dyn AudioSource> = Arc::new(native::NativeMicrophone);
        #[cfg(not(feature = "native-audio"))]
        let microphone: Arc<dyn AudioSource> = Arc::new(Unavailable);

        Self {
            camera,
            microphone,
            settle,
        }
    }
}
