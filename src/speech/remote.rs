use crate::config::SpeechConfig;
use crate::http::{client, ensure_success, require_key};
use crate::{CoachError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

/// Voice selection passed with every synthesis request
#[derive(Clone, Debug, PartialEq)]
pub struct VoiceParams {
    pub voice_id: String,
    pub model_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
}

impl VoiceParams {
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self {
            voice_id: config.voice_id.clone(),
            model_id: config.model_id.clone(),
            stability: config.stability,
            similarity_boost: config.similarity_boost,
        }
    }
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self::from_config(&SpeechConfig::default())
    }
}

/// Remote text-to-speech returning an encoded audio payload
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<Vec<u8>>;
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

/// ElevenLabs text-to-speech client
pub struct ElevenLabsSynthesizer {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ElevenLabsSynthesizer {
    /// Build from config. Fails when no API key is configured.
    pub fn from_config(config: &SpeechConfig) -> Result<Self> {
        let api_key = require_key(config.api_key.as_ref(), "ElevenLabs")?;
        // The announcer bounds the whole call; this only guards a stuck socket
        let client = client(config.remote_timeout())?;
        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, voice_id: &str) -> String {
        format!("{}/v1/text-to-speech/{}", self.base_url, voice_id)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<Vec<u8>> {
        let body = SynthesisRequest {
            text,
            model_id: &params.model_id,
            voice_settings: VoiceSettings {
                stability: params.stability,
                similarity_boost: params.similarity_boost,
            },
        };

        let response = self
            .client
            .post(self.endpoint(&params.voice_id))
            .header("xi-api-key", &self.api_key)
            .header("accept", "audio/mpeg")
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response, "ElevenLabs").await?;

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(CoachError::SpeechError("ElevenLabs returned no audio".into()));
        }
        debug!("Synthesized {} chars into {} bytes", text.len(), bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_key() {
        let result = ElevenLabsSynthesizer::from_config(&SpeechConfig::default());
        assert!(matches!(result, Err(CoachError::ConfigError(_))));
    }

    #[test]
    fn test_endpoint() {
        let config = SpeechConfig {
            base_url: "https://tts.example.com/".to_string(),
            ..SpeechConfig::default()
        }
        .with_api_key("key");
        let synth = ElevenLabsSynthesizer::from_config(&config).unwrap();
        assert_eq!(
            synth.endpoint("abc"),
            "https://tts.example.com/v1/text-to-speech/abc"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let params = VoiceParams::default();
        let body = SynthesisRequest {
            text: "Time!",
            model_id: &params.model_id,
            voice_settings: VoiceSettings {
                stability: params.stability,
                similarity_boost: params.similarity_boost,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["text"], "Time!");
        assert_eq!(json["model_id"], "eleven_monolingual_v1");
        assert_eq!(json["voice_settings"]["stability"], 0.5);
        assert_eq!(json["voice_settings"]["similarity_boost"], 0.75);
    }
}
