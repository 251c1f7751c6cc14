use crate::config::MistralConfig;
use crate::http::{client, ensure_success, require_key};
use crate::vision::{AnalysisRequest, FormAnalyzer, FormAssessment};
use crate::{CoachError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const ANALYSIS_PROMPT: &str = r#"Analyze this boxing training frame. Evaluate stance width and balance, guard position (hands up, chin down), weight distribution and any visible issues.

Answer with a single JSON object and nothing else:
{"stance_score": 0-100, "guard_score": 0-100, "balance_score": 0-100, "overall_form": 0-100, "feedback": ["short correction", ...], "detected_stance": "orthodox" | "southpaw" | "unknown", "hands_position": "high" | "low" | "dropping"}

Feedback items are spoken to the fighter: at most six words each, most important first."#;

#[derive(Serialize)]
struct VisionRequest {
    model: String,
    messages: Vec<VisionMessage>,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct VisionMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: String },
}

#[derive(Deserialize)]
struct VisionResponse {
    choices: Vec<VisionChoice>,
}

#[derive(Deserialize)]
struct VisionChoice {
    message: VisionAnswer,
}

#[derive(Deserialize)]
struct VisionAnswer {
    content: String,
}

/// Pixtral form analyzer
pub struct MistralVision {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl MistralVision {
    pub fn from_config(config: &MistralConfig) -> Result<Self> {
        Ok(Self {
            client: client(config.request_timeout())?,
            api_key: require_key(config.api_key.as_ref(), "Mistral")?,
            endpoint: format!(
                "{}/v1/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            model: config.vision_model.clone(),
        })
    }

    fn build_request(&self, request: &AnalysisRequest) -> VisionRequest {
        let context = format!(
            "The fighter is doing a {} drill and should be in {} stance.",
            request.drill_category.as_str(),
            request.expected_stance
        );
        VisionRequest {
            model: self.model.clone(),
            messages: vec![VisionMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: format!("{}\n\n{}", context, ANALYSIS_PROMPT),
                    },
                    ContentPart::ImageUrl {
                        image_url: request.frame.data_url(),
                    },
                ],
            }],
            max_tokens: 300,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}

/// Pull the JSON object out of a model answer that may carry extra text
fn parse_assessment(answer: &str) -> Result<FormAssessment> {
    let start = answer.find('{');
    let end = answer.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &answer[start..=end],
        _ => {
            return Err(CoachError::AnalysisError(
                "Vision answer contained no JSON".into(),
            ))
        }
    };
    serde_json::from_str(json)
        .map_err(|e| CoachError::AnalysisError(format!("Invalid vision JSON: {}", e)))
}

#[async_trait]
impl FormAnalyzer for MistralVision {
    async fn analyze(&self, request: AnalysisRequest) -> Result<FormAssessment> {
        if request.frame.bytes.is_empty() {
            return Err(CoachError::AnalysisError("Empty frame".into()));
        }

        let body = self.build_request(&request);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response, "Mistral vision").await?;

        let parsed: VisionResponse = response
            .json()
            .await
            .map_err(|e| CoachError::AnalysisError(format!("Failed to parse response: {}", e)))?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CoachError::AnalysisError("No choices in response".into()))?;

        let assessment = parse_assessment(&answer)?;
        debug!(
            "Form assessment: overall {:.0}, stance {:?}",
            assessment.overall_form, assessment.detected_stance
        );
        Ok(assessment)
    }
}
