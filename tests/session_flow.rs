//! End-to-end session runs against fake collaborators on a paused clock

use async_trait::async_trait;
use corner_coach::audio::{AudioCapture, AudioClip, AudioSink, CaptureHandle, NullSink};
use corner_coach::checkin::CheckinRecorder;
use corner_coach::coach::{CoachingReply, ReplyRequest};
use corner_coach::config::{CheckinConfig, StorageConfig, TimingConfig};
use corner_coach::drills::{Difficulty, Stance};
use corner_coach::records::{SessionRecord, SessionRecorder};
use corner_coach::session::{
    FeedbackTone, Phase, SessionDriver, SessionEvent, SessionHandle, SessionOrchestrator,
    SessionServices, StyleProfile,
};
use corner_coach::speech::{LocalSpeech, SpeechSynthesizer, Transcriber, VoiceAnnouncer, VoiceParams};
use corner_coach::vision::{AnalysisRequest, FormAnalysisPoller, FormAnalyzer, FormAssessment, Frame, FrameSource};
use corner_coach::{CoachError, Result};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

#[derive(Default)]
struct RecordingVoice {
    spoken: Mutex<Vec<String>>,
}

#[async_trait]
impl LocalSpeech for RecordingVoice {
    async fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct BrokenRemote {
    calls: AtomicU32,
}

#[async_trait]
impl SpeechSynthesizer for BrokenRemote {
    async fn synthesize(&self, _text: &str, _params: &VoiceParams) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CoachError::RemoteStatus {
            status: 429,
            message: "quota exceeded".into(),
        })
    }
}

struct StillCamera;

#[async_trait]
impl FrameSource for StillCamera {
    async fn capture(&self) -> Result<Frame> {
        Ok(Frame::jpeg(vec![0xFF, 0xD8, 0xFF]))
    }
}

/// Takes two seconds per frame and always asks for higher hands
struct SlowAnalyzer;

#[async_trait]
impl FormAnalyzer for SlowAnalyzer {
    async fn analyze(&self, _request: AnalysisRequest) -> Result<FormAssessment> {
        sleep(Duration::from_secs(2)).await;
        Ok(FormAssessment {
            overall_form: 40.0,
            feedback: vec!["Hands up".to_string()],
            ..Default::default()
        })
    }
}

struct Mic;
struct MicHandle;

#[async_trait]
impl CaptureHandle for MicHandle {
    async fn finish(self: Box<Self>) -> Result<AudioClip> {
        Ok(AudioClip::new(vec![0.2; 8_000], 16_000))
    }
}

#[async_trait]
impl AudioCapture for Mic {
    async fn acquire(&self) -> Result<Box<dyn CaptureHandle>> {
        Ok(Box::new(MicHandle))
    }
}

/// Mic that counts how often it was opened
#[derive(Default)]
struct CountingMic {
    acquired: AtomicU32,
}

#[async_trait]
impl AudioCapture for CountingMic {
    async fn acquire(&self) -> Result<Box<dyn CaptureHandle>> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MicHandle))
    }
}

struct FixedTranscript;

#[async_trait]
impl Transcriber for FixedTranscript {
    async fn transcribe(&self, _wav: Vec<u8>) -> Result<String> {
        Ok("my shoulders are burning".to_string())
    }
}

struct FixedCoach;

#[async_trait]
impl CoachingReply for FixedCoach {
    async fn reply(&self, _request: ReplyRequest) -> Result<String> {
        Ok("Drop them, shake them out, hands back up.".to_string())
    }
}

struct Harness {
    handle: SessionHandle,
    task: JoinHandle<()>,
    voice: Arc<RecordingVoice>,
    events: Vec<SessionEvent>,
}

impl Harness {
    fn new(difficulty: Difficulty, dir: &Path, configure: impl FnOnce(&mut SessionServices)) -> Self {
        Self::with_remote(difficulty, dir, None, configure)
    }

    fn with_remote(
        difficulty: Difficulty,
        dir: &Path,
        remote: Option<Arc<dyn SpeechSynthesizer>>,
        configure: impl FnOnce(&mut SessionServices),
    ) -> Self {
        let voice = Arc::new(RecordingVoice::default());
        let sink: Arc<dyn AudioSink> = Arc::new(NullSink);
        let mut services = SessionServices {
            announcer: VoiceAnnouncer::new(remote, voice.clone(), Arc::clone(&sink)),
            sink,
            poller: None,
            checkin: None,
            recorder: SessionRecorder::from_config(&StorageConfig::in_dir(dir)),
            stance: Stance::Orthodox,
            timing: TimingConfig::default(),
        };
        configure(&mut services);

        let (handle, task) = SessionDriver::spawn(
            SessionOrchestrator::new(difficulty, StyleProfile::Technical),
            services,
        );
        Self {
            handle,
            task,
            voice,
            events: Vec::new(),
        }
    }

    async fn settle(&mut self, duration: Duration) {
        sleep(duration).await;
        self.events.extend(self.handle.drain_events());
    }

    async fn wait_for_record(&mut self) -> SessionRecord {
        for _ in 0..50 {
            self.settle(Duration::from_millis(100)).await;
            let found = self.events.iter().find_map(|e| match e {
                SessionEvent::SessionComplete(record) => Some(record.clone()),
                _ => None,
            });
            if let Some(record) = found {
                return record;
            }
        }
        panic!("session never produced a record");
    }

    async fn shutdown(self) {
        self.handle.shutdown().unwrap();
        self.task.await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn beginner_session_runs_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(Difficulty::Beginner, dir.path(), |_| {});

    h.handle.start().unwrap();
    h.settle(Duration::from_millis(180_500)).await;
    assert_eq!(h.handle.snapshot().phase, Phase::ChecklistGate);
    assert_eq!(h.handle.snapshot().current_index, 0);

    // Time at the gate is not counted
    h.settle(Duration::from_secs(30)).await;
    assert_eq!(h.handle.snapshot().elapsed_secs, 180);

    h.handle.acknowledge_checklist().unwrap();
    h.settle(Duration::from_millis(120_500)).await;
    assert_eq!(h.handle.snapshot().phase, Phase::ChecklistGate);

    h.handle.toggle_checklist_item(0).unwrap();
    h.handle.acknowledge_checklist().unwrap();
    h.settle(Duration::from_millis(120_500)).await;

    let record = h.wait_for_record().await;
    assert_eq!(h.handle.snapshot().phase, Phase::Complete);
    assert_eq!(record.rounds_completed, 3);
    assert_eq!(record.total_rounds, 3);
    assert_eq!(record.total_elapsed_secs, 420);
    assert_eq!(record.completed_drills.len(), 3);
    assert_eq!(record.style_label, "Technical");

    let history = SessionRecorder::from_config(&StorageConfig::in_dir(dir.path()))
        .history()
        .load()
        .unwrap();
    assert_eq!(history[0].id, record.id);

    // Welcome, two round announcements and the closing line
    assert_eq!(h.voice.spoken.lock().len(), 4);
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn ending_early_counts_only_finished_rounds() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(Difficulty::Intermediate, dir.path(), |_| {});

    h.handle.start().unwrap();
    h.settle(Duration::from_millis(500)).await;
    h.handle.skip().unwrap();
    h.settle(Duration::from_millis(500)).await;
    h.handle.acknowledge_checklist().unwrap();
    h.settle(Duration::from_millis(42_500)).await;
    h.handle.pause().unwrap();
    h.settle(Duration::from_millis(500)).await;
    h.handle.end_early().unwrap();

    let record = h.wait_for_record().await;
    assert_eq!(record.rounds_completed, 1);
    assert_eq!(record.total_rounds, 4);
    assert_eq!(record.total_elapsed_secs, 42);
    assert!(!record.is_complete());

    // Only reset leaves Complete
    h.handle.start().unwrap();
    h.settle(Duration::from_millis(500)).await;
    assert_eq!(h.handle.snapshot().phase, Phase::Complete);
    h.handle.reset().unwrap();
    h.settle(Duration::from_millis(500)).await;
    assert_eq!(h.handle.snapshot().phase, Phase::Idle);
    assert_eq!(h.handle.snapshot().elapsed_secs, 0);
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn pause_blocks_in_flight_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(Difficulty::Beginner, dir.path(), |services| {
        services.poller = Some(FormAnalysisPoller::new(
            Arc::new(StillCamera),
            Arc::new(SlowAnalyzer),
            Duration::from_secs(8),
        ));
    });

    h.handle.start().unwrap();
    // First poll goes out at 3s and answers at 5s
    h.settle(Duration::from_millis(3_500)).await;
    h.handle.pause().unwrap();
    h.settle(Duration::from_secs(5)).await;
    assert!(h.handle.snapshot().feedback.is_none());
    assert!(!h.events.iter().any(|e| matches!(e, SessionEvent::Feedback(_))));

    h.handle.resume().unwrap();
    h.settle(Duration::from_millis(5_800)).await;

    let snapshot = h.handle.snapshot();
    let feedback = snapshot.feedback.expect("poll after resume applies");
    assert_eq!(feedback.label, "Hands up");
    assert_eq!(feedback.tone, FeedbackTone::Adjust);
    assert_eq!(snapshot.time_remaining_secs, 172);
    assert_eq!(snapshot.focus_tally.get("Hands up"), Some(&1));
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn remote_voice_failure_sticks_for_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(BrokenRemote::default());
    let mut h = Harness::with_remote(
        Difficulty::Beginner,
        dir.path(),
        Some(remote.clone() as Arc<dyn SpeechSynthesizer>),
        |_| {},
    );

    h.handle.start().unwrap();
    h.settle(Duration::from_millis(200)).await;
    h.handle.skip().unwrap();
    h.settle(Duration::from_millis(200)).await;
    h.handle.acknowledge_checklist().unwrap();
    h.settle(Duration::from_millis(200)).await;
    h.handle.end_early().unwrap();
    h.wait_for_record().await;

    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.voice.spoken.lock().len(), 3);
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn manual_checkin_reaches_the_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(Difficulty::Beginner, dir.path(), |services| {
        services.checkin = Some(CheckinRecorder::new(
            Arc::new(Mic),
            Arc::new(FixedTranscript),
            Arc::new(FixedCoach),
            services.announcer.clone(),
            CheckinConfig::default(),
        ));
    });

    h.handle.start().unwrap();
    h.settle(Duration::from_millis(1_500)).await;
    h.handle.start_checkin().unwrap();
    h.settle(Duration::from_millis(2_000)).await;
    h.handle.stop_checkin().unwrap();
    h.settle(Duration::from_millis(400)).await;

    let transcript = h.handle.snapshot().transcript.expect("check-in applied");
    assert_eq!(transcript.transcript, "my shoulders are burning");
    assert_eq!(transcript.reply, "Drop them, shake them out, hands back up.");
    assert!(h
        .voice
        .spoken
        .lock()
        .iter()
        .any(|line| line.starts_with("Drop them")));
    // The round clock kept running through the check-in
    assert_eq!(h.handle.snapshot().elapsed_secs, 3);
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn auto_listen_captures_during_rounds() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(Difficulty::Beginner, dir.path(), |services| {
        services.checkin = Some(CheckinRecorder::new(
            Arc::new(Mic),
            Arc::new(FixedTranscript),
            Arc::new(FixedCoach),
            services.announcer.clone(),
            CheckinConfig {
                auto_listen: true,
                ..Default::default()
            },
        ));
    });

    h.handle.start().unwrap();
    // First capture at 20s, closed after the 3.5s window
    h.settle(Duration::from_secs(19)).await;
    assert!(h.handle.snapshot().transcript.is_none());
    h.settle(Duration::from_secs(5)).await;
    assert!(h.handle.snapshot().transcript.is_some());
    h.shutdown().await;
}

fn auto_listening(mic: Arc<CountingMic>) -> impl FnOnce(&mut SessionServices) {
    move |services| {
        services.checkin = Some(CheckinRecorder::new(
            mic,
            Arc::new(FixedTranscript),
            Arc::new(FixedCoach),
            services.announcer.clone(),
            CheckinConfig {
                auto_listen: true,
                ..Default::default()
            },
        ));
    }
}

#[tokio::test(start_paused = true)]
async fn auto_listen_stays_quiet_while_paused() {
    let dir = tempfile::tempdir().unwrap();
    let mic = Arc::new(CountingMic::default());
    let mut h = Harness::new(Difficulty::Beginner, dir.path(), auto_listening(mic.clone()));

    h.handle.start().unwrap();
    h.settle(Duration::from_secs(5)).await;
    h.handle.pause().unwrap();
    h.settle(Duration::from_secs(40)).await;

    assert_eq!(h.handle.snapshot().phase, Phase::Paused);
    assert!(h.handle.snapshot().transcript.is_none());
    assert_eq!(mic.acquired.load(Ordering::SeqCst), 0);

    // The cadence starts over on resume
    h.handle.resume().unwrap();
    h.settle(Duration::from_secs(24)).await;
    assert_eq!(mic.acquired.load(Ordering::SeqCst), 1);
    assert!(h.handle.snapshot().transcript.is_some());
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn auto_listen_stays_quiet_at_the_checklist() {
    let dir = tempfile::tempdir().unwrap();
    let mic = Arc::new(CountingMic::default());
    let mut h = Harness::new(Difficulty::Beginner, dir.path(), auto_listening(mic.clone()));

    h.handle.start().unwrap();
    h.settle(Duration::from_secs(5)).await;
    h.handle.skip().unwrap();
    h.settle(Duration::from_secs(40)).await;

    assert_eq!(h.handle.snapshot().phase, Phase::ChecklistGate);
    assert!(h.handle.snapshot().transcript.is_none());
    assert_eq!(mic.acquired.load(Ordering::SeqCst), 0);
    h.shutdown().await;
}
