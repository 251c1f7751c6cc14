use crate::audio::AudioSink;
use crate::config::SpeechConfig;
use crate::speech::local::LocalSpeech;
use crate::speech::remote::{SpeechSynthesizer, VoiceParams};
use crate::speech::text::normalize_for_speech;
use crate::{CoachError, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Marks the announcer busy until dropped
struct SpeakingGuard(Arc<AtomicUsize>);

impl SpeakingGuard {
    fn raise(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for SpeakingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Speaks coaching lines, remote voice first.
///
/// The first remote failure or timeout switches the announcer to the local
/// voice for the rest of the session. `announce` never returns an error.
#[derive(Clone)]
pub struct VoiceAnnouncer {
    remote: Option<Arc<dyn SpeechSynthesizer>>,
    local: Arc<dyn LocalSpeech>,
    sink: Arc<dyn AudioSink>,
    params: VoiceParams,
    remote_timeout: Duration,
    local_timeout: Duration,
    fallback: Arc<AtomicBool>,
    speaking: Arc<AtomicUsize>,
}

impl VoiceAnnouncer {
    pub fn new(
        remote: Option<Arc<dyn SpeechSynthesizer>>,
        local: Arc<dyn LocalSpeech>,
        sink: Arc<dyn AudioSink>,
    ) -> Self {
        let defaults = SpeechConfig::default();
        Self {
            fallback: Arc::new(AtomicBool::new(remote.is_none())),
            remote,
            local,
            sink,
            params: VoiceParams::from_config(&defaults),
            remote_timeout: defaults.remote_timeout(),
            local_timeout: defaults.local_timeout(),
            speaking: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Take voice selection and timeouts from config
    pub fn configured(mut self, config: &SpeechConfig) -> Self {
        self.params = VoiceParams::from_config(config);
        self.remote_timeout = config.remote_timeout();
        self.local_timeout = config.local_timeout();
        self
    }

    pub fn with_timeouts(mut self, remote: Duration, local: Duration) -> Self {
        self.remote_timeout = remote;
        self.local_timeout = local;
        self
    }

    /// True while any announcement is in flight
    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst) > 0
    }

    /// True once the remote voice has been abandoned
    pub fn is_fallback(&self) -> bool {
        self.fallback.load(Ordering::SeqCst)
    }

    /// Give the remote voice another chance (new session)
    pub fn reset_fallback(&self) {
        self.fallback.store(self.remote.is_none(), Ordering::SeqCst);
    }

    /// Speak a line. Always resolves, within the remote bound plus the local bound.
    pub async fn announce(&self, text: &str) {
        let text = normalize_for_speech(text);
        if text.is_empty() {
            return;
        }
        let _guard = SpeakingGuard::raise(&self.speaking);

        if !self.is_fallback() {
            if let Some(remote) = &self.remote {
                match timeout(self.remote_timeout, self.speak_remote(remote.as_ref(), &text)).await
                {
                    Ok(Ok(())) => return,
                    Ok(Err(e)) => warn!("Remote voice failed: {}", e),
                    Err(_) => warn!(
                        "Remote voice timed out after {} ms",
                        self.remote_timeout.as_millis()
                    ),
                }
                if !self.fallback.swap(true, Ordering::SeqCst) {
                    info!("Switching to the local voice for the rest of the session");
                }
            }
        }

        match timeout(self.local_timeout, self.local.speak(&text)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Local voice failed: {}", e),
            Err(_) => warn!(
                "Local voice timed out after {} ms",
                self.local_timeout.as_millis()
            ),
        }
    }

    async fn speak_remote(&self, remote: &dyn SpeechSynthesizer, text: &str) -> Result<()> {
        let audio = remote.synthesize(text, &self.params).await?;
        if audio.is_empty() {
            return Err(CoachError::SpeechError("Empty audio payload".into()));
        }
        debug!("Playing {} bytes of remote speech", audio.len());
        self.sink.play_encoded(audio).await
    }
}
