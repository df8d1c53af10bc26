//! Two-phase voice recording.
//!
//! [`start`] acquires the microphone and spawns an accumulator that appends
//! fragments in arrival order. [`Recording::stop`] ends accumulation, releases
//! the microphone, and assembles everything into a WAV payload.

use super::{AudioFormat, AudioSource, AudioStream, DeviceGuard, payload::Payload};
use crate::core::error::ChatError;
use tokio::{sync::oneshot, task::JoinHandle};

const WAV_HEADER_LEN: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;

/// Fragments collected between start and stop.
#[derive(Debug, Default)]
pub struct RecordingSession {
    chunks: Vec<Vec<i16>>,
}

impl RecordingSession {
    pub fn push(&mut self, fragment: Vec<i16>) {
        self.chunks.push(fragment);
    }

    pub fn sample_count(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Concatenates the fragments into one WAV payload, consuming the session.
    pub fn finish(self, format: AudioFormat) -> Payload {
        let samples = self.sample_count();
        let mut pcm = Vec::with_capacity(samples * 2);
        for sample in self.chunks.into_iter().flatten() {
            pcm.extend_from_slice(&sample.to_le_bytes());
        }
        Payload::new("audio/wav", wav_file(format, pcm))
    }
}

/// An active recording. Dropping it without `stop` abandons the audio and
/// still releases the microphone.
#[derive(Debug)]
pub struct Recording {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<Payload>,
}

pub async fn start(source: &dyn AudioSource) -> Result<Recording, ChatError> {
    let stream = source.acquire().await?;
    tracing::info!(
        "Microphone acquired: {} Hz, {} channel(s)",
        stream.format.sample_rate,
        stream.format.channels
    );
    let (stop_tx, stop_rx) = oneshot::channel();
    let task = tokio::spawn(accumulate(stream, stop_rx));
    Ok(Recording { stop_tx, task })
}

impl Recording {
    pub async fn stop(self) -> Result<Payload, ChatError> {
        let _ = self.stop_tx.send(());
        let payload = self.task.await?;
        tracing::info!("Recording finished: {} bytes", payload.data().len());
        Ok(payload)
    }
}

async fn accumulate(stream: AudioStream, mut stop_rx: oneshot::Receiver<()>) -> Payload {
    let AudioStream {
        format,
        mut fragments,
        device,
    } = stream;
    let mut device = DeviceGuard::new(device);
    let mut session = RecordingSession::default();

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            fragment = fragments.recv() => match fragment {
                Some(fragment) => session.push(fragment),
                None => {
                    tracing::warn!("Microphone stream ended before stop");
                    let _ = (&mut stop_rx).await;
                    break;
                }
            },
        }
    }

    device.release();
    // Fragments the device delivered before it was released.
    while let Ok(fragment) = fragments.try_recv() {
        session.push(fragment);
    }
    session.finish(format)
}

fn wav_file(format: AudioFormat, pcm: Vec<u8>) -> Vec<u8> {
    let block_align = format.channels * (BITS_PER_SAMPLE / 8);
    let byte_rate = format.sample_rate * u32::from(block_align);
    let data_len = pcm.len() as u32;

    let mut wav = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&format.channels.to_le_bytes());
    wav.extend_from_slice(&format.sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend(pcm);
    wav
}

/// Playback length of a WAV payload produced by [`RecordingSession::finish`].
pub fn wav_duration_secs(wav: &[u8]) -> Option<f32> {
    if wav.len() < WAV_HEADER_LEN || &wav[0..4] != b"RIFF" || &wav[8..12] != b"WAVE" {
        return None;
    }
    let byte_rate = u32::from_le_bytes(wav[28..32].try_into().ok()?);
    let data_len = u32::from_le_bytes(wav[40..44].try_into().ok()?);
    if byte_rate == 0 {
        return None;
    }
    Some(data_len as f32 / byte_rate as f32)
}
