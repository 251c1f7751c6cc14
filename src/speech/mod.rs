//! Speech output and input
//!
//! This module provides:
//! - The voice announcer (remote voice with a sticky local fallback)
//! - ElevenLabs synthesis and a local command voice
//! - Speech-to-text for voice check-ins

pub mod announcer;
pub mod local;
pub mod remote;
pub mod stt;
pub mod text;

// Re-export commonly used types
pub use announcer::VoiceAnnouncer;
pub use local::{CommandSpeech, LocalSpeech};
pub use remote::{ElevenLabsSynthesizer, SpeechSynthesizer, VoiceParams};
pub use stt::{MistralTranscriber, Transcriber};
pub use text::normalize_for_speech;
