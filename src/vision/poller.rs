use crate::drills::{DrillCategory, Stance};
use crate::session::state::Feedback;
use crate::vision::{classify, AnalysisRequest, FormAnalyzer, FrameSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// One capture-and-classify cycle of the form analysis loop.
///
/// Scheduling lives in the session driver; this type only runs a single
/// bounded poll and never surfaces errors.
#[derive(Clone)]
pub struct FormAnalysisPoller {
    frames: Arc<dyn FrameSource>,
    analyzer: Arc<dyn FormAnalyzer>,
    timeout: Duration,
}

impl FormAnalysisPoller {
    pub fn new(
        frames: Arc<dyn FrameSource>,
        analyzer: Arc<dyn FormAnalyzer>,
        timeout: Duration,
    ) -> Self {
        Self {
            frames,
            analyzer,
            timeout,
        }
    }

    /// Capture a frame and classify it. `None` means keep the previous feedback.
    pub async fn poll_once(
        &self,
        drill_category: DrillCategory,
        expected_stance: Stance,
    ) -> Option<Feedback> {
        let work = async {
            let frame = self.frames.capture().await?;
            self.analyzer
                .analyze(AnalysisRequest {
                    frame,
                    drill_category,
                    expected_stance,
                })
                .await
        };

        match timeout(self.timeout, work).await {
            Ok(Ok(assessment)) => {
                let feedback = classify(&assessment, expected_stance);
                debug!("Form feedback: {:?} {}", feedback.tone, feedback.label);
                Some(feedback)
            }
            Ok(Err(e)) => {
                warn!("Form analysis failed: {}", e);
                None
            }
            Err(_) => {
                warn!("Form analysis timed out after {} ms", self.timeout.as_millis());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::FeedbackTone;
    use crate::vision::{DetectedStance, FormAssessment, Frame};
    use crate::{CoachError, Result};
    use async_trait::async_trait;

    struct StillFrame;

    #[async_trait]
    impl FrameSource for StillFrame {
        async fn capture(&self) -> Result<Frame> {
            Ok(Frame::jpeg(vec![0xFF, 0xD8]))
        }
    }

    struct NoCamera;

    #[async_trait]
    impl FrameSource for NoCamera {
        async fn capture(&self) -> Result<Frame> {
            Err(CoachError::CapturePermission("camera denied".into()))
        }
    }

    enum Verdict {
        Score(f32),
        Fail,
        Hang,
    }

    struct FakeAnalyzer(Verdict);

    #[async_trait]
    impl FormAnalyzer for FakeAnalyzer {
        async fn analyze(&self, request: AnalysisRequest) -> Result<FormAssessment> {
            match self.0 {
                Verdict::Score(overall) => Ok(FormAssessment {
                    overall_form: overall,
                    feedback: vec![format!("Watch the {}", request.drill_category.as_str())],
                    detected_stance: DetectedStance::Orthodox,
                    ..Default::default()
                }),
                Verdict::Fail => Err(CoachError::RemoteStatus {
                    status: 500,
                    message: "down".into(),
                }),
                Verdict::Hang => std::future::pending().await,
            }
        }
    }

    fn poller(frames: Arc<dyn FrameSource>, verdict: Verdict) -> FormAnalysisPoller {
        FormAnalysisPoller::new(
            frames,
            Arc::new(FakeAnalyzer(verdict)),
            Duration::from_secs(8),
        )
    }

    #[tokio::test]
    async fn test_poll_classifies() {
        let p = poller(Arc::new(StillFrame), Verdict::Score(50.0));
        let feedback = p
            .poll_once(DrillCategory::Technique, Stance::Orthodox)
            .await
            .unwrap();
        assert_eq!(feedback.tone, FeedbackTone::Adjust);
        assert_eq!(feedback.label, "Watch the technique");
    }

    #[tokio::test]
    async fn test_failures_yield_none() {
        let p = poller(Arc::new(StillFrame), Verdict::Fail);
        assert!(p.poll_once(DrillCategory::Combo, Stance::Orthodox).await.is_none());

        let p = poller(Arc::new(NoCamera), Verdict::Score(90.0));
        assert!(p.poll_once(DrillCategory::Combo, Stance::Orthodox).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_is_bounded() {
        let p = poller(Arc::new(StillFrame), Verdict::Hang);
        let started = tokio::time::Instant::now();
        assert!(p.poll_once(DrillCategory::Warmup, Stance::Southpaw).await.is_none());
        assert!(started.elapsed() <= Duration::from_secs(8));
    }
}
