//! Platform device backends. Device handles from `cpal` and `nokhwa` are not
//! `Send`, so each acquired stream lives on its own worker thread and is
//! driven over channels.

use super::MediaStream;
use crate::core::error::{ChatError, Device, DeviceError};
use std::{sync::mpsc as std_mpsc, thread::JoinHandle};

/// Handle to a device owned by a worker thread. Releasing stops the thread.
struct WorkerHandle {
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Signals the worker and reaps it off the async executor.
    fn release(&mut self) {
        drop(self.stop_tx.take());
        let Some(thread) = self.thread.take() else {
            return;
        };
        let join = move || {
            if thread.join().is_err() {
                tracing::error!("Device worker thread panicked");
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(join);
            }
            Err(_) => join(),
        }
    }
}

fn worker_gone(device: Device) -> ChatError {
    DeviceError::access(device, "device worker exited").into()
}

#[cfg(feature = "native-audio")]
pub use audio::NativeMicrophone;

#[cfg(feature = "native-audio")]
mod audio {
    use super::*;
    use crate::media::{AudioFormat, AudioSource, AudioStream};
    use async_trait::async_trait;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use tokio::sync::{mpsc, oneshot};

    /// The host's default input device.
    pub struct NativeMicrophone;

    struct MicrophoneHandle(WorkerHandle);

    impl MediaStream for MicrophoneHandle {
        fn release(&mut self) {
            tracing::info!("Releasing microphone");
            self.0.release();
        }
    }

    #[async_trait]
    impl AudioSource for NativeMicrophone {
        async fn acquire(&self) -> Result<AudioStream, ChatError> {
            let (ready_tx, ready_rx) = oneshot::channel();
            let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
            let (fragment_tx, fragments) = mpsc::unbounded_channel();

            let thread = std::thread::Builder::new()
                .name("microphone".into())
                .spawn(move || {
                    let stream = match open_input(fragment_tx) {
                        Ok((stream, format)) => {
                            let _ = ready_tx.send(Ok(format));
                            stream
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    // Blocks until the handle is released or dropped.
                    let _ = stop_rx.recv();
                    drop(stream);
                })
                .map_err(|e| DeviceError::access(Device::Microphone, e))?;

            let format = ready_rx
                .await
                .map_err(|_| worker_gone(Device::Microphone))??;
            Ok(AudioStream {
                format,
                fragments,
                device: Box::new(MicrophoneHandle(WorkerHandle {
                    stop_tx: Some(stop_tx),
                    thread: Some(thread),
                })),
            })
        }
    }

    fn open_input(
        fragment_tx: mpsc::UnboundedSender<Vec<i16>>,
    ) -> Result<(cpal::Stream, AudioFormat), ChatError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(DeviceError::Unavailable(Device::Microphone))?;
        let supported = device
            .default_input_config()
            .map_err(|e| DeviceError::access(Device::Microphone, e))?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        let format = AudioFormat {
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        };

        let err_fn = |err| tracing::error!("Audio input error: {}", err);
        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let fragment = data
                        .iter()
                        .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .collect();
                    let _ = fragment_tx.send(fragment);
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let _ = fragment_tx.send(data.to_vec());
                },
                err_fn,
                None,
            ),
            other => {
                return Err(DeviceError::access(
                    Device::Microphone,
                    format!("unsupported sample format {other:?}"),
                )
                .into());
            }
        }
        .map_err(|e| DeviceError::access(Device::Microphone, e))?;

        stream
            .play()
            .map_err(|e| DeviceError::access(Device::Microphone, e))?;
        Ok((stream, format))
    }
}

#[cfg(feature = "native-camera")]
pub use camera::NativeCamera;

#[cfg(feature = "native-camera")]
mod camera {
    use super::*;
    use crate::media::{Frame, VideoSource, VideoStream};
    use async_trait::async_trait;
    use nokhwa::{
        Camera,
        pixel_format::RgbAFormat,
        utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    };
    use tokio::sync::oneshot;

    pub struct NativeCamera {
        index: u32,
    }

    impl NativeCamera {
        pub fn new(index: u32) -> Self {
            Self { index }
        }
    }

    type GrabReply = oneshot::Sender<Result<Frame, ChatError>>;

    struct CameraHandle {
        worker: WorkerHandle,
        grab_tx: std_mpsc::Sender<GrabReply>,
        resolution: (u32, u32),
    }

    impl MediaStream for CameraHandle {
        fn release(&mut self) {
            tracing::info!("Releasing camera");
            self.worker.release();
        }
    }

    #[async_trait]
    impl VideoStream for CameraHandle {
        fn resolution(&self) -> (u32, u32) {
            self.resolution
        }

        async fn grab_frame(&mut self) -> Result<Frame, ChatError> {
            let (reply_tx, reply_rx) = oneshot::channel();
            self.grab_tx
                .send(reply_tx)
                .map_err(|_| worker_gone(Device::Camera))?;
            reply_rx.await.map_err(|_| worker_gone(Device::Camera))?
        }
    }

    #[async_trait]
    impl VideoSource for NativeCamera {
        async fn acquire(&self) -> Result<Box<dyn VideoStream>, ChatError> {
            let index = self.index;
            let (ready_tx, ready_rx) = oneshot::channel();
            let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
            let (grab_tx, grab_rx) = std_mpsc::channel::<GrabReply>();

            let thread = std::thread::Builder::new()
                .name("camera".into())
                .spawn(move || {
                    let mut camera = match open_camera(index) {
                        Ok(camera) => camera,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let resolution = camera.resolution();
                    let _ = ready_tx.send(Ok((resolution.width(), resolution.height())));

                    loop {
                        if !matches!(stop_rx.try_recv(), Err(std_mpsc::TryRecvError::Empty)) {
                            break;
                        }
                        match grab_rx.recv_timeout(std::time::Duration::from_millis(50)) {
                            Ok(reply) => {
                                let _ = reply.send(grab(&mut camera));
                            }
                            Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                            Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
                        }
                    }
                    if let Err(e) = camera.stop_stream() {
                        tracing::warn!("Failed to stop camera stream: {}", e);
                    }
                })
                .map_err(|e| DeviceError::access(Device::Camera, e))?;

            let resolution = ready_rx.await.map_err(|_| worker_gone(Device::Camera))??;
            Ok(Box::new(CameraHandle {
                worker: WorkerHandle {
                    stop_tx: Some(stop_tx),
                    thread: Some(thread),
                },
                grab_tx,
                resolution,
            }))
        }
    }

    fn open_camera(index: u32) -> Result<Camera, ChatError> {
        let format =
            RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestResolution);
        let mut camera = Camera::new(CameraIndex::Index(index), format)
            .map_err(|e| DeviceError::access(Device::Camera, e))?;
        camera
            .open_stream()
            .map_err(|e| DeviceError::access(Device::Camera, e))?;
        Ok(camera)
    }

    fn grab(camera: &mut Camera) -> Result<Frame, ChatError> {
        let buffer = camera
            .frame()
            .map_err(|e| DeviceError::access(Device::Camera, e))?;
        let image = buffer
            .decode_image::<RgbAFormat>()
            .map_err(|e| DeviceError::access(Device::Camera, e))?;
        Ok(Frame {
            width: image.width(),
            height: image.height(),
            rgba: image.into_raw(),
        })
    }
}
