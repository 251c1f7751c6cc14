//! Setup-time API key checks
//!
//! Not used while a session runs. Each check makes at most one minimal
//! request and reports the outcome instead of failing.

use crate::config::{MistralConfig, SpeechConfig};
use crate::http::{client, ensure_success};
use crate::speech::{ElevenLabsSynthesizer, SpeechSynthesizer, VoiceParams};
use crate::Result;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFormat {
    /// Event keys shaped like a UUID, accepted without a network call
    Hackathon,
    Standard,
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFormat::Hackathon => f.write_str("hackathon"),
            KeyFormat::Standard => f.write_str("standard"),
        }
    }
}

/// Outcome of a key check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyCheck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<KeyFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KeyCheck {
    fn valid(format: Option<KeyFormat>) -> Self {
        Self {
            ok: true,
            format,
            error: None,
        }
    }

    fn invalid(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            format: None,
            error: Some(error.into()),
        }
    }
}

/// Tell hackathon keys from standard keys. `None` for a blank key.
pub fn classify_mistral_key(key: &str) -> Option<KeyFormat> {
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    // Only the hyphenated 36-char form counts
    if key.len() == 36 && Uuid::parse_str(key).is_ok() {
        Some(KeyFormat::Hackathon)
    } else {
        Some(KeyFormat::Standard)
    }
}

/// Check a Mistral key with a one-token chat request
pub async fn check_mistral_key(config: &MistralConfig, key: &str) -> KeyCheck {
    let format = match classify_mistral_key(key) {
        None => return KeyCheck::invalid("Missing key"),
        Some(KeyFormat::Hackathon) => {
            info!("Accepting hackathon-format Mistral key");
            return KeyCheck::valid(Some(KeyFormat::Hackathon));
        }
        Some(format) => format,
    };

    match probe_mistral(config, key.trim()).await {
        Ok(()) => KeyCheck::valid(Some(format)),
        Err(e) => {
            warn!("Mistral key rejected: {}", e);
            KeyCheck::invalid(format!("Mistral key invalid: {}", e))
        }
    }
}

async fn probe_mistral(config: &MistralConfig, key: &str) -> Result<()> {
    let body = json!({
        "model": config.chat_model,
        "messages": [{"role": "user", "content": "hi"}],
        "max_tokens": 1,
    });
    let response = client(config.request_timeout())?
        .post(format!(
            "{}/v1/chat/completions",
            config.base_url.trim_end_matches('/')
        ))
        .bearer_auth(key)
        .json(&body)
        .send()
        .await?;
    ensure_success(response, "Mistral").await?;
    Ok(())
}

/// Check an ElevenLabs key with a minimal synthesis request
pub async fn check_elevenlabs_key(config: &SpeechConfig, key: &str) -> KeyCheck {
    let key = key.trim();
    if key.is_empty() {
        return KeyCheck::invalid("Missing key");
    }

    let config = config.clone().with_api_key(key);
    let result = async {
        let synth = ElevenLabsSynthesizer::from_config(&config)?;
        synth.synthesize("ok", &VoiceParams::from_config(&config)).await
    }
    .await;

    match result {
        Ok(_) => KeyCheck::valid(None),
        Err(e) => {
            warn!("ElevenLabs key rejected: {}", e);
            KeyCheck::invalid(format!("ElevenLabs key invalid: {}", e))
        }
    }
}
