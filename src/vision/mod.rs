//! Form analysis: frame capture, remote assessment and feedback classification

pub mod mistral;
pub mod poller;

pub use mistral::MistralVision;
pub use poller::FormAnalysisPoller;

use crate::drills::{DrillCategory, Stance};
use crate::session::state::{Feedback, FeedbackTone};
use crate::{CoachError, Result};
use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::Deserialize;
use std::path::PathBuf;

/// Overall score at or above which form is called good
pub const GOOD_FORM_THRESHOLD: f32 = 80.0;
/// Overall score below which a correction is given
pub const ADJUST_THRESHOLD: f32 = 65.0;

/// One still image of the fighter
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Frame {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: "image/jpeg".to_string(),
        }
    }

    /// Inline `data:` URL accepted by vision models
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            BASE64_STANDARD.encode(&self.bytes)
        )
    }
}

/// Camera or other frame provider
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture(&self) -> Result<Frame>;
}

/// Reads the latest snapshot an external camera process writes to disk
#[derive(Clone, Debug)]
pub struct FileFrameSource {
    path: PathBuf,
}

impl FileFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FrameSource for FileFrameSource {
    async fn capture(&self) -> Result<Frame> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            CoachError::CapturePermission(format!("Cannot read frame {:?}: {}", self.path, e))
        })?;
        let mime_type = match self.path.extension().and_then(|ext| ext.to_str()) {
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            _ => "image/jpeg",
        };
        Ok(Frame {
            bytes,
            mime_type: mime_type.to_string(),
        })
    }
}

/// What the analyzer is asked to judge
#[derive(Clone, Debug)]
pub struct AnalysisRequest {
    pub frame: Frame,
    pub drill_category: DrillCategory,
    pub expected_stance: Stance,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectedStance {
    Orthodox,
    Southpaw,
    #[default]
    #[serde(other)]
    Unknown,
}

impl DetectedStance {
    pub fn as_stance(&self) -> Option<Stance> {
        match self {
            DetectedStance::Orthodox => Some(Stance::Orthodox),
            DetectedStance::Southpaw => Some(Stance::Southpaw),
            DetectedStance::Unknown => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandsPosition {
    #[default]
    High,
    Low,
    Dropping,
}

/// Scores (0-100) and corrections returned for a frame
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FormAssessment {
    pub stance_score: f32,
    pub guard_score: f32,
    pub balance_score: f32,
    pub overall_form: f32,
    pub feedback: Vec<String>,
    pub detected_stance: DetectedStance,
    pub hands_position: HandsPosition,
}

/// Judges a frame
#[async_trait]
pub trait FormAnalyzer: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest) -> Result<FormAssessment>;
}

/// Reduce an assessment to the one-line feedback shown during a round
pub fn classify(assessment: &FormAssessment, expected: Stance) -> Feedback {
    if let Some(detected) = assessment.detected_stance.as_stance() {
        if detected != expected {
            return Feedback::new(format!("Switch to {} stance", expected), FeedbackTone::Adjust);
        }
    }

    let overall = assessment.overall_form.clamp(0.0, 100.0);
    let first_note = assessment
        .feedback
        .iter()
        .map(|note| note.trim())
        .find(|note| !note.is_empty());

    if overall >= GOOD_FORM_THRESHOLD {
        Feedback::new("Good form, keep it up", FeedbackTone::Good)
    } else if overall < ADJUST_THRESHOLD {
        let label = match (first_note, assessment.hands_position) {
            (Some(note), _) => note.to_string(),
            (None, HandsPosition::High) => "Tighten up your form".to_string(),
            (None, _) => "Hands up, chin down".to_string(),
        };
        Feedback::new(label, FeedbackTone::Adjust)
    } else {
        Feedback::new(first_note.unwrap_or("Keep working"), FeedbackTone::Neutral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(overall: f32, notes: &[&str], stance: DetectedStance) -> FormAssessment {
        FormAssessment {
            overall_form: overall,
            feedback: notes.iter().map(|s| s.to_string()).collect(),
            detected_stance: stance,
            ..Default::default()
        }
    }

    #[test]
    fn test_stance_mismatch_wins() {
        let fb = classify(
            &assessment(95.0, &[], DetectedStance::Southpaw),
            Stance::Orthodox,
        );
        assert_eq!(fb, Feedback::new("Switch to orthodox stance", FeedbackTone::Adjust));
    }

    #[test]
    fn test_unknown_stance_is_not_mismatch() {
        let fb = classify(
            &assessment(85.0, &[], DetectedStance::Unknown),
            Stance::Southpaw,
        );
        assert_eq!(fb.tone, FeedbackTone::Good);
    }

    #[test]
    fn test_thresholds() {
        let notes = ["Keep your chin tucked", "Hands slightly higher"];
        let good = classify(&assessment(80.0, &notes, DetectedStance::Orthodox), Stance::Orthodox);
        assert_eq!(good.tone, FeedbackTone::Good);

        let neutral =
            classify(&assessment(65.0, &notes, DetectedStance::Orthodox), Stance::Orthodox);
        assert_eq!(neutral, Feedback::new("Keep your chin tucked", FeedbackTone::Neutral));

        let adjust =
            classify(&assessment(64.9, &notes, DetectedStance::Orthodox), Stance::Orthodox);
        assert_eq!(adjust, Feedback::new("Keep your chin tucked", FeedbackTone::Adjust));
    }

    #[test]
    fn test_low_score_without_notes() {
        let mut low = assessment(40.0, &["  "], DetectedStance::Unknown);
        low.hands_position = HandsPosition::Dropping;
        assert_eq!(
            classify(&low, Stance::Orthodox),
            Feedback::new("Hands up, chin down", FeedbackTone::Adjust)
        );
    }

    #[test]
    fn test_assessment_parses_partial_json() {
        let parsed: FormAssessment = serde_json::from_str(
            r#"{"overall_form": 72.5, "detected_stance": "sideways", "feedback": ["Bend your knees"]}"#,
        )
        .unwrap();
        assert_eq!(parsed.detected_stance, DetectedStance::Unknown);
        assert_eq!(parsed.hands_position, HandsPosition::High);
        assert_eq!(parsed.feedback, vec!["Bend your knees"]);
    }

    #[test]
    fn test_data_url() {
        let frame = Frame::jpeg(vec![0xFF, 0xD8, 0xFF]);
        assert_eq!(frame.data_url(), "data:image/jpeg;base64,/9j/");
    }

    #[tokio::test]
    async fn test_file_frame_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let frame = FileFrameSource::new(&path).capture().await.unwrap();
        assert_eq!(frame.mime_type, "image/png");
        assert_eq!(frame.bytes, vec![1, 2, 3]);

        let missing = FileFrameSource::new(dir.path().join("none.jpg")).capture().await;
        assert!(matches!(missing, Err(CoachError::CapturePermission(_))));
    }
}
