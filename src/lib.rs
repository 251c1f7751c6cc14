pub mod audio;
pub mod checkin;
pub mod coach;
pub mod config;
pub mod drills;
pub(crate) mod http;
pub mod keys;
pub mod records;
pub mod session;
pub mod speech;
pub mod vision;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CoachError {
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    #[error("Capture permission denied: {0}")]
    CapturePermission(String),

    #[error("Speech synthesis error: {0}")]
    SpeechError(String),

    #[error("Transcription error: {0}")]
    TranscriptionError(String),

    #[error("Coaching reply error: {0}")]
    ReplyError(String),

    #[error("Form analysis error: {0}")]
    AnalysisError(String),

    #[error("Remote service returned {status}: {message}")]
    RemoteStatus { status: u16, message: String },

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl From<std::io::Error> for CoachError {
    fn from(e: std::io::Error) -> Self {
        CoachError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for CoachError {
    fn from(e: serde_json::Error) -> Self {
        CoachError::StorageError(e.to_string())
    }
}

impl From<reqwest::Error> for CoachError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => CoachError::RemoteStatus {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => CoachError::IOError(format!("Request failed: {}", e)),
        }
    }
}

impl CoachError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Hardware/device errors may require user intervention
            CoachError::AudioDeviceError(_) => false,
            CoachError::CapturePermission(_) => false,
            // Remote services degrade or get ignored
            CoachError::SpeechError(_) => true,
            CoachError::TranscriptionError(_) => true,
            CoachError::ReplyError(_) => true,
            CoachError::AnalysisError(_) => true,
            CoachError::RemoteStatus { .. } => true,
            CoachError::Timeout(_) => true,
            CoachError::IOError(_) => false,
            // History is best-effort
            CoachError::StorageError(_) => true,
            CoachError::ConfigError(_) => false,
            CoachError::ChannelError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            CoachError::AudioDeviceError(_) => {
                "Audio device error. Please check your microphone/speakers.".to_string()
            }
            CoachError::CapturePermission(_) => {
                "Microphone access denied. Please allow microphone permissions.".to_string()
            }
            CoachError::SpeechError(_) => {
                "Voice coaching is unavailable. Switching to the local voice.".to_string()
            }
            CoachError::TranscriptionError(_) => {
                "Could not understand that check-in. Please try again.".to_string()
            }
            CoachError::ReplyError(_) => {
                "Coach reply failed. Keep working, we'll try again.".to_string()
            }
            CoachError::AnalysisError(_) => "Form analysis is temporarily unavailable.".to_string(),
            CoachError::RemoteStatus { .. } => {
                "A coaching service rejected the request. Please check your keys.".to_string()
            }
            CoachError::Timeout(_) => "A coaching service took too long to respond.".to_string(),
            CoachError::IOError(_) => "File system error occurred.".to_string(),
            CoachError::StorageError(_) => {
                "Session history could not be saved. Results are still shown.".to_string()
            }
            CoachError::ConfigError(_) => "Configuration error. Please check settings.".to_string(),
            CoachError::ChannelError(_) => {
                "Internal communication error. Please restart the session.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CoachError>;
