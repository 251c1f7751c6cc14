//! Voice check-ins: capture what the fighter says, answer through the announcer
//!
//! A check-in goes Idle -> Recording -> Processing -> Idle. Manual mode is an
//! explicit start/stop pair; auto-listen records for a fixed window and stops
//! by itself. Failures land in `last_error` and never touch the session phase.

use crate::audio::{encode_wav, AudioCapture, CaptureHandle};
use crate::coach::{reply_or_fallback, CoachingReply, ReplyRequest};
use crate::config::CheckinConfig;
use crate::drills::Difficulty;
use crate::session::state::{StyleProfile, TranscriptLog};
use crate::speech::{Transcriber, VoiceAnnouncer};
use crate::{CoachError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CheckinState {
    #[default]
    Idle,
    Recording,
    Processing,
}

#[derive(Default)]
struct CheckinInner {
    state: CheckinState,
    last_error: Option<String>,
    capture: Option<Box<dyn CaptureHandle>>,
}

/// Records, transcribes and answers voice check-ins
#[derive(Clone)]
pub struct CheckinRecorder {
    capture: Arc<dyn AudioCapture>,
    transcriber: Arc<dyn Transcriber>,
    coach: Arc<dyn CoachingReply>,
    announcer: VoiceAnnouncer,
    config: CheckinConfig,
    inner: Arc<Mutex<CheckinInner>>,
}

impl CheckinRecorder {
    pub fn new(
        capture: Arc<dyn AudioCapture>,
        transcriber: Arc<dyn Transcriber>,
        coach: Arc<dyn CoachingReply>,
        announcer: VoiceAnnouncer,
        config: CheckinConfig,
    ) -> Self {
        Self {
            capture,
            transcriber,
            coach,
            announcer,
            config,
            inner: Arc::new(Mutex::new(CheckinInner::default())),
        }
    }

    pub fn state(&self) -> CheckinState {
        self.inner.lock().state
    }

    /// Last user-facing error, if any
    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    pub fn auto_listen_enabled(&self) -> bool {
        self.config.auto_listen
    }

    pub fn config(&self) -> &CheckinConfig {
        &self.config
    }

    /// True when a hands-free capture may start now
    pub fn can_auto_listen(&self) -> bool {
        self.config.auto_listen
            && self.state() == CheckinState::Idle
            && !self.announcer.is_speaking()
    }

    /// Acquire the microphone and start recording.
    ///
    /// Ignored unless idle. A permission failure is recorded in `last_error`.
    pub async fn start_recording(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            if inner.state != CheckinState::Idle {
                debug!("Check-in already in progress ({:?})", inner.state);
                return Ok(());
            }
            inner.state = CheckinState::Recording;
            inner.last_error = None;
        }

        match self.capture.acquire().await {
            Ok(handle) => {
                self.inner.lock().capture = Some(handle);
                info!("Check-in recording started");
                Ok(())
            }
            Err(e) => {
                warn!("Could not start check-in recording: {}", e);
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Stop recording and run the check-in pipeline.
    ///
    /// Returns `None` when nothing was recorded or nothing was said.
    pub async fn stop_recording(
        &self,
        style: StyleProfile,
        difficulty: Difficulty,
    ) -> Result<Option<TranscriptLog>> {
        let handle = {
            let mut inner = self.inner.lock();
            match (inner.state, inner.capture.take()) {
                (CheckinState::Recording, Some(handle)) => {
                    inner.state = CheckinState::Processing;
                    handle
                }
                (state, handle) => {
                    inner.capture = handle;
                    debug!("No recording to stop ({:?})", state);
                    return Ok(None);
                }
            }
        };

        match self.process(handle, style, difficulty).await {
            Ok(log) => {
                self.inner.lock().state = CheckinState::Idle;
                Ok(log)
            }
            Err(e) => {
                warn!("Check-in failed: {}", e);
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Hands-free capture: record for the configured window, then process
    pub async fn auto_capture(
        &self,
        style: StyleProfile,
        difficulty: Difficulty,
    ) -> Result<Option<TranscriptLog>> {
        if !self.can_auto_listen() {
            return Ok(None);
        }
        self.start_recording().await?;
        sleep(self.config.capture_window()).await;
        self.stop_recording(style, difficulty).await
    }

    async fn process(
        &self,
        handle: Box<dyn CaptureHandle>,
        style: StyleProfile,
        difficulty: Difficulty,
    ) -> Result<Option<TranscriptLog>> {
        let clip = handle.finish().await?;
        if clip.is_empty() {
            debug!("Empty check-in clip");
            return Ok(None);
        }
        debug!("Check-in clip: {:.1}s", clip.duration_secs());
        let wav = encode_wav(&clip.samples, clip.sample_rate)?;

        let pipeline = async {
            let transcript = self.transcriber.transcribe(wav).await?;
            if transcript.trim().is_empty() {
                return Ok(None);
            }
            let request = ReplyRequest::new(style, difficulty, transcript.clone());
            let reply = reply_or_fallback(self.coach.as_ref(), request).await;
            Ok::<_, CoachError>(Some(TranscriptLog { transcript, reply }))
        };

        let limit = self.config.pipeline_timeout();
        let log = timeout(limit, pipeline)
            .await
            .map_err(|_| CoachError::Timeout(limit.as_millis() as u64))??;

        if let Some(log) = &log {
            info!("Check-in: {:?} -> {:?}", log.transcript, log.reply);
            self.announcer.announce(&log.reply).await;
        }
        Ok(log)
    }

    fn fail(&self, error: &CoachError) {
        let mut inner = self.inner.lock();
        inner.state = CheckinState::Idle;
        inner.capture = None;
        inner.last_error = Some(error.user_message());
    }
}
