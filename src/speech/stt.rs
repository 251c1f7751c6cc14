//! Speech-to-text for voice check-ins

use crate::config::MistralConfig;
use crate::http::{client, ensure_success, require_key};
use crate::{CoachError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Turns a WAV payload into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String>;
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Mistral audio transcription client
pub struct MistralTranscriber {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl MistralTranscriber {
    pub fn from_config(config: &MistralConfig) -> Result<Self> {
        Ok(Self {
            client: client(config.request_timeout())?,
            api_key: require_key(config.api_key.as_ref(), "Mistral")?,
            endpoint: format!(
                "{}/v1/audio/transcriptions",
                config.base_url.trim_end_matches('/')
            ),
            model: config.transcription_model.clone(),
        })
    }
}

#[async_trait]
impl Transcriber for MistralTranscriber {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        if wav.is_empty() {
            return Err(CoachError::TranscriptionError("Empty recording".into()));
        }
        let size = wav.len();

        let file = Part::bytes(wav)
            .file_name("checkin.wav")
            .mime_str("audio/wav")?;
        let form = Form::new()
            .text("model", self.model.clone())
            .part("file", file);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let response = ensure_success(response, "Mistral transcription").await?;

        let parsed: TranscriptionResponse = response.json().await.map_err(|e| {
            CoachError::TranscriptionError(format!("Failed to parse transcription: {}", e))
        })?;
        let text = parsed.text.trim().to_string();
        debug!("Transcribed {} bytes: {:?}", size, text);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_and_key() {
        assert!(MistralTranscriber::from_config(&MistralConfig::default()).is_err());

        let transcriber =
            MistralTranscriber::from_config(&MistralConfig::default().with_api_key("k")).unwrap();
        assert_eq!(
            transcriber.endpoint,
            "https://api.mistral.ai/v1/audio/transcriptions"
        );
        assert_eq!(transcriber.model, "voxtral-mini-latest");
    }

    #[tokio::test]
    async fn test_empty_recording_rejected() {
        let transcriber =
            MistralTranscriber::from_config(&MistralConfig::default().with_api_key("k")).unwrap();
        assert!(matches!(
            transcriber.transcribe(Vec::new()).await,
            Err(CoachError::TranscriptionError(_))
        ));
    }

    #[test]
    fn test_parse_response() {
        let parsed: TranscriptionResponse =
            serde_json::from_str(r#"{"text":" my shoulders are tired ","language":"en"}"#)
                .unwrap();
        assert_eq!(parsed.text.trim(), "my shoulders are tired");
    }
}
