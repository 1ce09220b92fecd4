//! Audio output: a thin rodio wrapper behind the [`Playback`] seam.
//!
//! The rodio `OutputStream` is not `Send`, so a dedicated holder thread opens
//! the default device once and keeps the stream alive for the process
//! lifetime; everything else talks to the device through the cloneable stream
//! handle. Playback is the only source of the `Playing` status upstream.

use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::fmt;
use std::io::Cursor;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    Unavailable(String),
    Output(String),
    Decode(String),
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerError::Unavailable(msg) => write!(f, "audio output unavailable: {msg}"),
            PlayerError::Output(msg) => write!(f, "audio output error: {msg}"),
            PlayerError::Decode(msg) => write!(f, "audio decode error: {msg}"),
        }
    }
}

/// Incremental playback session for one streaming synthesis. Chunks are
/// appended as they arrive; `finish` blocks until the sink drains.
pub trait StreamVoice: Send {
    fn push(&mut self, pcm: &[u8]) -> Result<(), PlayerError>;
    fn finish(self: Box<Self>) -> Result<(), PlayerError>;
}

/// Seam between the session engine and the audio device.
pub trait Playback: Send + Sync {
    fn available(&self) -> bool;
    /// Why the device is unavailable, when it is.
    fn describe_error(&self) -> Option<String>;
    /// Decode a complete compressed buffer and block until playback ends.
    fn play_buffer(&self, bytes: Vec<u8>) -> Result<(), PlayerError>;
    /// Open an incremental PCM session at the given sample rate (mono s16le).
    fn begin_stream(&self, sample_rate: u32) -> Result<Box<dyn StreamVoice>, PlayerError>;
    /// Interrupt whatever is playing. Safe to call when idle; the device is
    /// ready for a new request as soon as this returns.
    fn stop(&self);
    fn is_busy(&self) -> bool;
}

type SharedSink = Arc<Mutex<Option<Arc<Sink>>>>;

pub struct AudioPlayer {
    handle: Option<OutputStreamHandle>,
    init_error: Option<String>,
    current: SharedSink,
}

impl AudioPlayer {
    /// Probe the default output device. Failure is recorded, not fatal: the
    /// engine reports playback as unavailable instead of crashing the UI.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("audio-device".into())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = tx.send(Ok(handle));
                    // Keep the stream alive; parking forever is fine because
                    // the thread dies with the process.
                    let _stream = stream;
                    loop {
                        thread::park();
                    }
                }
                Err(err) => {
                    let _ = tx.send(Err(err.to_string()));
                }
            })
            .expect("failed to spawn audio device thread");

        match rx.recv() {
            Ok(Ok(handle)) => Self {
                handle: Some(handle),
                init_error: None,
                current: Arc::new(Mutex::new(None)),
            },
            Ok(Err(msg)) => Self::unavailable(msg),
            Err(_) => Self::unavailable("audio device thread exited".to_string()),
        }
    }

    fn unavailable(msg: String) -> Self {
        Self {
            handle: None,
            init_error: Some(msg),
            current: Arc::new(Mutex::new(None)),
        }
    }

    fn new_sink(&self) -> Result<Arc<Sink>, PlayerError> {
        let handle = self.handle.as_ref().ok_or_else(|| {
            PlayerError::Unavailable(
                self.init_error.clone().unwrap_or_else(|| "no output device".to_string()),
            )
        })?;
        let sink = Sink::try_new(handle).map_err(|err| PlayerError::Output(err.to_string()))?;
        let sink = Arc::new(sink);
        register(&self.current, &sink);
        Ok(sink)
    }
}

impl Default for AudioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Playback for AudioPlayer {
    fn available(&self) -> bool {
        self.handle.is_some()
    }

    fn describe_error(&self) -> Option<String> {
        self.init_error.clone()
    }

    fn play_buffer(&self, bytes: Vec<u8>) -> Result<(), PlayerError> {
        let sink = self.new_sink()?;
        let source = Decoder::new(Cursor::new(bytes))
            .map_err(|err| PlayerError::Decode(err.to_string()))?;
        sink.append(source);
        // Blocks the calling worker, never the UI thread. A stop() from the
        // UI empties the sink and this returns promptly.
        sink.sleep_until_end();
        unregister(&self.current, &sink);
        Ok(())
    }

    fn begin_stream(&self, sample_rate: u32) -> Result<Box<dyn StreamVoice>, PlayerError> {
        let sink = self.new_sink()?;
        Ok(Box::new(RodioStreamVoice {
            sink,
            sample_rate,
            current: Arc::clone(&self.current),
        }))
    }

    fn stop(&self) {
        let guard = self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(sink) = guard.as_ref() {
            sink.stop();
        }
    }

    fn is_busy(&self) -> bool {
        let guard = self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.as_ref().map(|sink| !sink.empty()).unwrap_or(false)
    }
}

struct RodioStreamVoice {
    sink: Arc<Sink>,
    sample_rate: u32,
    current: SharedSink,
}

impl StreamVoice for RodioStreamVoice {
    fn push(&mut self, pcm: &[u8]) -> Result<(), PlayerError> {
        let samples = pcm_to_samples(pcm);
        if samples.is_empty() {
            return Ok(());
        }
        self.sink.append(SamplesBuffer::new(1, self.sample_rate, samples));
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), PlayerError> {
        self.sink.sleep_until_end();
        unregister(&self.current, &self.sink);
        Ok(())
    }
}

fn register(slot: &SharedSink, sink: &Arc<Sink>) {
    let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = Some(Arc::clone(sink));
}

fn unregister(slot: &SharedSink, sink: &Arc<Sink>) {
    let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if guard.as_ref().is_some_and(|held| Arc::ptr_eq(held, sink)) {
        *guard = None;
    }
}

/// Interpret raw bytes as little-endian 16-bit mono samples. A trailing odd
/// byte is dropped.
pub(crate) fn pcm_to_samples(pcm: &[u8]) -> Vec<i16> {
    pcm.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_conversion_is_little_endian() {
        let samples = pcm_to_samples(&[0x01, 0x00, 0xFF, 0x7F, 0x00, 0x80]);
        assert_eq!(samples, vec![1, i16::MAX, i16::MIN]);
    }

    #[test]
    fn pcm_conversion_drops_trailing_odd_byte() {
        assert_eq!(pcm_to_samples(&[0x01, 0x00, 0x42]), vec![1]);
        assert!(pcm_to_samples(&[0x42]).is_empty());
        assert!(pcm_to_samples(&[]).is_empty());
    }
}
