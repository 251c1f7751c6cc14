//! Audio primitives: bell synthesis, WAV packaging and device IO
//!
//! Device access sits behind two traits so the session can run headless:
//! - `AudioSink` plays generated samples and encoded speech
//! - `AudioCapture` hands out microphone captures for voice check-ins

pub mod bell;
#[cfg(feature = "audio-io")]
pub mod input;
#[cfg(feature = "audio-io")]
pub mod output;
pub mod wav;

pub use bell::{bell_tone, BELL_SAMPLE_RATE};
#[cfg(feature = "audio-io")]
pub use input::MicrophoneCapture;
#[cfg(feature = "audio-io")]
pub use output::SpeakerSink;
pub use wav::{encode_wav, AudioClip};

use crate::{CoachError, Result};
use async_trait::async_trait;
use tracing::debug;

/// Audio output. Both calls resolve when playback has finished.
///
/// A new `play_encoded` call supersedes speech that is still playing.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play_samples(&self, samples: Vec<f32>, sample_rate: u32) -> Result<()>;

    /// Play a compressed payload (mp3/wav) as returned by a speech service
    async fn play_encoded(&self, bytes: Vec<u8>) -> Result<()>;
}

/// Sink that discards everything, for headless runs and tests
#[derive(Debug, Default, Clone)]
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn play_samples(&self, samples: Vec<f32>, sample_rate: u32) -> Result<()> {
        debug!("Discarding {} samples at {} Hz", samples.len(), sample_rate);
        Ok(())
    }

    async fn play_encoded(&self, bytes: Vec<u8>) -> Result<()> {
        if bytes.is_empty() {
            return Err(CoachError::SpeechError("Empty audio payload".into()));
        }
        debug!("Discarding {} encoded bytes", bytes.len());
        Ok(())
    }
}

/// A running microphone capture
#[async_trait]
pub trait CaptureHandle: Send {
    /// Stop capturing and return the clip
    async fn finish(self: Box<Self>) -> Result<AudioClip>;
}

/// Source of microphone captures
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Acquire the capture device and start recording.
    ///
    /// Returns `CoachError::CapturePermission` when access is denied.
    async fn acquire(&self) -> Result<Box<dyn CaptureHandle>>;
}
