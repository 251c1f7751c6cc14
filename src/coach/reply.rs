use crate::coach::prompts::{build_system_prompt, FALLBACK_REPLY};
use crate::config::MistralConfig;
use crate::drills::Difficulty;
use crate::http::{client, ensure_success, require_key};
use crate::session::state::StyleProfile;
use crate::{CoachError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What the fighter said, plus the tone to answer in
#[derive(Clone, Debug, PartialEq)]
pub struct ReplyRequest {
    pub style_prompt: String,
    pub difficulty_prompt: String,
    pub utterance: String,
}

impl ReplyRequest {
    pub fn new(style: StyleProfile, difficulty: Difficulty, utterance: impl Into<String>) -> Self {
        Self {
            style_prompt: style.prompt().to_string(),
            difficulty_prompt: difficulty.prompt().to_string(),
            utterance: utterance.into(),
        }
    }

    pub fn system_prompt(&self) -> String {
        build_system_prompt(&self.style_prompt, &self.difficulty_prompt)
    }
}

/// Generates a short spoken answer to a check-in
#[async_trait]
pub trait CoachingReply: Send + Sync {
    async fn reply(&self, request: ReplyRequest) -> Result<String>;
}

/// Ask for a reply, substituting the fixed phrase on any failure
pub async fn reply_or_fallback(coach: &dyn CoachingReply, request: ReplyRequest) -> String {
    match coach.reply(request).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            warn!("Coach reply was empty, using fallback phrase");
            FALLBACK_REPLY.to_string()
        }
        Err(e) => {
            warn!("Coach reply failed: {}", e);
            FALLBACK_REPLY.to_string()
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Mistral chat-completions client
pub struct MistralCoach {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

impl MistralCoach {
    pub fn from_config(config: &MistralConfig) -> Result<Self> {
        Ok(Self {
            client: client(config.request_timeout())?,
            api_key: require_key(config.api_key.as_ref(), "Mistral")?,
            endpoint: format!(
                "{}/v1/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            model: config.chat_model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    fn build_request(&self, request: &ReplyRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_prompt(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.utterance.clone(),
                },
            ],
            max_tokens: self.max_tokens,
        }
    }
}

fn extract_text(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| CoachError::ReplyError("Reply contained no text".into()))
}

#[async_trait]
impl CoachingReply for MistralCoach {
    async fn reply(&self, request: ReplyRequest) -> Result<String> {
        if request.utterance.trim().is_empty() {
            return Err(CoachError::ReplyError("Nothing to reply to".into()));
        }

        let body = self.build_request(&request);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response, "Mistral chat").await?;

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CoachError::ReplyError(format!("Failed to parse reply: {}", e)))?;
        let text = extract_text(parsed)?;
        debug!("Coach reply: {}", text);
        Ok(text)
    }
}
