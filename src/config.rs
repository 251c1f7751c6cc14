//! Configuration for a coaching session
//!
//! Loaded from `config.toml` in the user's config directory, with API keys
//! optionally supplied through the environment. Credentials live here and are
//! handed to each client at construction time.

use crate::drills::{Difficulty, Stance};
use crate::session::state::StyleProfile;
use crate::{CoachError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const APP_DIR: &str = "corner-coach";

/// Remote and local speech settings
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// ElevenLabs API key. Without it every announcement uses the local voice.
    pub api_key: Option<String>,
    pub base_url: String,
    pub voice_id: String,
    pub model_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    /// Bound on remote synthesis plus playback
    pub remote_timeout_ms: u64,
    /// Bound on the local fallback voice
    pub local_timeout_ms: u64,
    /// Local speech program, the text is passed as the last argument
    pub local_command: String,
    pub local_args: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.elevenlabs.io".to_string(),
            // Rachel
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            model_id: "eleven_monolingual_v1".to_string(),
            stability: 0.5,
            similarity_boost: 0.75,
            remote_timeout_ms: 30_000,
            local_timeout_ms: 15_000,
            local_command: "espeak-ng".to_string(),
            local_args: vec!["-s".to_string(), "165".to_string()],
        }
    }
}

impl SpeechConfig {
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeouts(mut self, remote_ms: u64, local_ms: u64) -> Self {
        self.remote_timeout_ms = remote_ms;
        self.local_timeout_ms = local_ms;
        self
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn local_timeout(&self) -> Duration {
        Duration::from_millis(self.local_timeout_ms)
    }
}

/// Settings for the Mistral-compatible text, vision and transcription APIs
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MistralConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub vision_model: String,
    pub transcription_model: String,
    pub max_tokens: u32,
    pub request_timeout_ms: u64,
}

impl Default for MistralConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.mistral.ai".to_string(),
            chat_model: "mistral-small-latest".to_string(),
            vision_model: "pixtral-12b-2409".to_string(),
            transcription_model: "voxtral-mini-latest".to_string(),
            max_tokens: 120,
            request_timeout_ms: 10_000,
        }
    }
}

impl MistralConfig {
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Timer cadences for a running session
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub tick_interval_ms: u64,
    pub poll_interval_ms: u64,
    pub analysis_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            poll_interval_ms: 3_000,
            analysis_timeout_ms: 8_000,
        }
    }
}

impl TimingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_millis(self.analysis_timeout_ms)
    }
}

/// Voice check-in settings
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CheckinConfig {
    /// Hands-free mode: capture automatically while a round is running
    pub auto_listen: bool,
    pub auto_listen_every_ms: u64,
    /// Auto captures are force-stopped after this window
    pub capture_window_ms: u64,
    /// Bound on transcription + reply
    pub pipeline_timeout_ms: u64,
}

impl Default for CheckinConfig {
    fn default() -> Self {
        Self {
            auto_listen: false,
            auto_listen_every_ms: 20_000,
            capture_window_ms: 3_500,
            pipeline_timeout_ms: 20_000,
        }
    }
}

impl CheckinConfig {
    pub fn auto_listen_every(&self) -> Duration {
        Duration::from_millis(self.auto_listen_every_ms)
    }

    pub fn capture_window(&self) -> Duration {
        Duration::from_millis(self.capture_window_ms)
    }

    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_millis(self.pipeline_timeout_ms)
    }
}

/// Where session results are kept
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub history_path: PathBuf,
    pub handoff_path: PathBuf,
    pub history_cap: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR);
        Self {
            history_path: data_dir.join("history.json"),
            handoff_path: std::env::temp_dir().join(APP_DIR).join("last_session.json"),
            history_cap: 20,
        }
    }
}

impl StorageConfig {
    /// Keep everything under one directory (used by tests and portable installs)
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            history_path: dir.join("history.json"),
            handoff_path: dir.join("last_session.json"),
            ..Default::default()
        }
    }
}

/// Complete configuration
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    pub difficulty: Difficulty,
    pub style: StyleProfile,
    pub stance: Stance,
    pub speech: SpeechConfig,
    pub mistral: MistralConfig,
    pub timing: TimingConfig,
    pub checkin: CheckinConfig,
    pub storage: StorageConfig,
}

impl CoachConfig {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| CoachError::ConfigError(format!("Invalid config: {}", e)))
    }

    /// Load from a file, falling back to defaults when it doesn't exist
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load from the default path and apply environment overrides
    pub fn load() -> Result<Self> {
        let config = match Self::default_path() {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Take API keys from `MISTRAL_API_KEY` / `ELEVENLABS_API_KEY` when set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("MISTRAL_API_KEY") {
            if !key.trim().is_empty() {
                self.mistral.api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(key) = std::env::var("ELEVENLABS_API_KEY") {
            if !key.trim().is_empty() {
                self.speech.api_key = Some(key.trim().to_string());
            }
        }
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_style(mut self, style: StyleProfile) -> Self {
        self.style = style;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.timing.tick_interval_ms == 0 || self.timing.poll_interval_ms == 0 {
            return Err(CoachError::ConfigError(
                "Timer intervals must be greater than zero".to_string(),
            ));
        }
        if self.storage.history_cap == 0 {
            return Err(CoachError::ConfigError(
                "History cap must be at least 1".to_string(),
            ));
        }
        if self.timing.analysis_timeout_ms == 0 || self.checkin.pipeline_timeout_ms == 0 {
            return Err(CoachError::ConfigError(
                "Timeouts must be greater than zero".to_string(),
            ));
        }
        if self.checkin.auto_listen
            && (self.checkin.capture_window_ms == 0 || self.checkin.auto_listen_every_ms == 0)
        {
            return Err(CoachError::ConfigError(
                "Auto-listen needs a capture window and a non-zero cadence".to_string(),
            ));
        }
        if self.speech.local_command.trim().is_empty() {
            return Err(CoachError::ConfigError(
                "Local speech command is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoachConfig::default();
        assert_eq!(config.difficulty, Difficulty::Beginner);
        assert_eq!(config.timing.poll_interval_ms, 3_000);
        assert_eq!(config.speech.remote_timeout_ms, 30_000);
        assert_eq!(config.speech.local_timeout_ms, 15_000);
        assert_eq!(config.checkin.capture_window_ms, 3_500);
        assert_eq!(config.storage.history_cap, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = CoachConfig::from_toml_str(
            r#"
            difficulty = "advanced"
            style = "zen"

            [speech]
            voice_id = "AZnzlk1XvdvUeBnXmlld"

            [checkin]
            auto_listen = true
            "#,
        )
        .unwrap();

        assert_eq!(config.difficulty, Difficulty::Advanced);
        assert_eq!(config.style, StyleProfile::Zen);
        assert_eq!(config.speech.voice_id, "AZnzlk1XvdvUeBnXmlld");
        assert_eq!(config.speech.model_id, "eleven_monolingual_v1");
        assert!(config.checkin.auto_listen);
    }

    #[test]
    fn test_invalid_toml() {
        let result = CoachConfig::from_toml_str("difficulty = \"legendary\"");
        assert!(matches!(result, Err(CoachError::ConfigError(_))));
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let mut config = CoachConfig::default();
        config.timing.tick_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = CoachConfig::default();
        config.checkin.auto_listen = true;
        config.checkin.auto_listen_every_ms = 0;
        assert!(matches!(config.validate(), Err(CoachError::ConfigError(_))));

        // Cadence only matters when auto-listen is on
        config.checkin.auto_listen = false;
        assert!(config.validate().is_ok());

        let mut config = CoachConfig::default();
        config.timing.analysis_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = CoachConfig::default();
        config.checkin.pipeline_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoachConfig::load_from(dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.style, StyleProfile::Hype);
    }

    #[test]
    fn test_storage_in_dir() {
        let storage = StorageConfig::in_dir("/tmp/coach");
        assert_eq!(storage.history_path, PathBuf::from("/tmp/coach/history.json"));
        assert_eq!(storage.history_cap, 20);
    }
}
