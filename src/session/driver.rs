//! Async runtime around the session state machine
//!
//! One tokio task owns the `SessionOrchestrator` and is the only place the
//! run is mutated. Commands, ticks and async results all arrive as messages
//! on one channel. Timers exist only while the phase is Running and carry the
//! stamp they were started with, so anything they send after a phase change
//! is dropped.

use crate::audio::{bell_tone, AudioSink, BELL_SAMPLE_RATE};
use crate::checkin::CheckinRecorder;
use crate::config::TimingConfig;
use crate::drills::Stance;
use crate::records::{SessionRecord, SessionRecorder};
use crate::session::orchestrator::{Effect, SessionOrchestrator};
use crate::session::state::{
    Feedback, Phase, SessionSnapshot, SharedSnapshot, Stamp, StyleProfile, TranscriptLog,
};
use crate::speech::VoiceAnnouncer;
use crate::vision::FormAnalysisPoller;
use crate::{CoachError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Commands accepted by a running session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Start,
    Pause,
    Resume,
    TogglePause,
    AcknowledgeChecklist,
    ToggleChecklistItem(usize),
    Skip,
    EndEarly,
    Reset,
    SetStyle(StyleProfile),
    /// Begin a manual voice check-in
    StartCheckin,
    /// Finish the manual check-in and get a reply
    StopCheckin,
    Shutdown,
}

/// Events emitted for the UI
#[derive(Debug, Clone)]
pub enum SessionEvent {
    PhaseChanged(Phase),
    Tick {
        time_remaining_secs: u32,
        elapsed_secs: u64,
    },
    Bell,
    Announced(String),
    Feedback(Feedback),
    Transcript(TranscriptLog),
    CheckinError(String),
    SessionComplete(SessionRecord),
    Shutdown,
}

/// Everything the driver talks to besides the state machine
#[derive(Clone)]
pub struct SessionServices {
    pub sink: Arc<dyn AudioSink>,
    pub announcer: VoiceAnnouncer,
    /// Form analysis, disabled when `None`
    pub poller: Option<FormAnalysisPoller>,
    /// Voice check-ins, disabled when `None`
    pub checkin: Option<CheckinRecorder>,
    pub recorder: SessionRecorder,
    pub stance: Stance,
    pub timing: TimingConfig,
}

enum Message {
    Command(SessionCommand),
    Tick(Stamp),
    Feedback(Stamp, Feedback),
    Transcript(Stamp, TranscriptLog),
    CheckinFailed(String),
    Recorded(SessionRecord),
}

/// Cloneable control surface for a session driver
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Message>,
    event_rx: Receiver<SessionEvent>,
    snapshot: SharedSnapshot,
}

impl SessionHandle {
    /// Send a command to the session
    pub fn send(&self, command: SessionCommand) -> Result<()> {
        self.tx
            .send(Message::Command(command))
            .map_err(|_| CoachError::ChannelError("Session driver has stopped".into()))
    }

    pub fn start(&self) -> Result<()> {
        self.send(SessionCommand::Start)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(SessionCommand::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.send(SessionCommand::Resume)
    }

    pub fn toggle_pause(&self) -> Result<()> {
        self.send(SessionCommand::TogglePause)
    }

    pub fn acknowledge_checklist(&self) -> Result<()> {
        self.send(SessionCommand::AcknowledgeChecklist)
    }

    pub fn toggle_checklist_item(&self, index: usize) -> Result<()> {
        self.send(SessionCommand::ToggleChecklistItem(index))
    }

    pub fn skip(&self) -> Result<()> {
        self.send(SessionCommand::Skip)
    }

    pub fn end_early(&self) -> Result<()> {
        self.send(SessionCommand::EndEarly)
    }

    pub fn reset(&self) -> Result<()> {
        self.send(SessionCommand::Reset)
    }

    pub fn set_style(&self, style: StyleProfile) -> Result<()> {
        self.send(SessionCommand::SetStyle(style))
    }

    pub fn start_checkin(&self) -> Result<()> {
        self.send(SessionCommand::StartCheckin)
    }

    pub fn stop_checkin(&self) -> Result<()> {
        self.send(SessionCommand::StopCheckin)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(SessionCommand::Shutdown)
    }

    /// Try to receive an event without blocking
    pub fn try_recv_event(&self) -> Option<SessionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// All events received so far
    pub fn drain_events(&self) -> Vec<SessionEvent> {
        self.event_rx.try_iter().collect()
    }

    /// Raw event receiver, for a UI thread that wants to block on events
    pub fn event_receiver(&self) -> Receiver<SessionEvent> {
        self.event_rx.clone()
    }

    /// Latest published session state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.get()
    }
}

/// Owns the orchestrator and performs its effects
pub struct SessionDriver {
    orchestrator: SessionOrchestrator,
    services: SessionServices,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    event_tx: Sender<SessionEvent>,
    snapshot: SharedSnapshot,
    timers: Vec<JoinHandle<()>>,
}

impl SessionDriver {
    pub fn new(orchestrator: SessionOrchestrator, services: SessionServices) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = unbounded();
        let snapshot = SharedSnapshot::new(orchestrator.snapshot());

        let handle = SessionHandle {
            tx: tx.clone(),
            event_rx,
            snapshot: snapshot.clone(),
        };
        let driver = Self {
            orchestrator,
            services,
            tx,
            rx,
            event_tx,
            snapshot,
            timers: Vec::new(),
        };
        (driver, handle)
    }

    /// Create the driver and run it on the current tokio runtime
    pub fn spawn(
        orchestrator: SessionOrchestrator,
        services: SessionServices,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (driver, handle) = Self::new(orchestrator, services);
        let task = tokio::spawn(driver.run());
        (handle, task)
    }

    /// Process messages until `Shutdown`
    pub async fn run(mut self) {
        info!("Session driver started");

        while let Some(message) = self.rx.recv().await {
            let before = self.orchestrator.phase();

            let keep_running = self.handle_message(message);

            // Publish first so a reader reacting to the event sees the new phase
            self.snapshot.publish(self.orchestrator.snapshot());
            let after = self.orchestrator.phase();
            if before != after {
                self.emit(SessionEvent::PhaseChanged(after));
            }

            if !keep_running {
                break;
            }
        }

        self.stop_timers();
        self.emit(SessionEvent::Shutdown);
        info!("Session driver stopped");
    }

    fn handle_message(&mut self, message: Message) -> bool {
        match message {
            Message::Command(SessionCommand::Shutdown) => return false,
            Message::Command(command) => self.handle_command(command),
            Message::Tick(stamp) => {
                if !self.orchestrator.accepts_tick(stamp) {
                    debug!("Dropping stale tick");
                    return true;
                }
                let effects = self.orchestrator.on_tick();
                let run = self.orchestrator.run();
                self.emit(SessionEvent::Tick {
                    time_remaining_secs: run.time_remaining_secs,
                    elapsed_secs: run.elapsed_secs,
                });
                self.perform(effects);
            }
            Message::Feedback(stamp, feedback) => {
                if self.orchestrator.apply_feedback(stamp, feedback.clone()) {
                    self.emit(SessionEvent::Feedback(feedback));
                }
            }
            Message::Transcript(stamp, log) => {
                if self.orchestrator.apply_transcript(stamp, log.clone()) {
                    self.emit(SessionEvent::Transcript(log));
                }
            }
            Message::CheckinFailed(message) => self.emit(SessionEvent::CheckinError(message)),
            Message::Recorded(record) => self.emit(SessionEvent::SessionComplete(record)),
        }
        true
    }

    fn handle_command(&mut self, command: SessionCommand) {
        debug!("Session command: {:?}", command);
        let effects = match command {
            SessionCommand::Start => self.orchestrator.start(),
            SessionCommand::Pause => self.orchestrator.pause(),
            SessionCommand::Resume => self.orchestrator.resume(),
            SessionCommand::TogglePause => self.orchestrator.toggle_pause(),
            SessionCommand::AcknowledgeChecklist => self.orchestrator.acknowledge_checklist(),
            SessionCommand::ToggleChecklistItem(index) => {
                self.orchestrator.toggle_checklist_item(index);
                Vec::new()
            }
            SessionCommand::Skip => self.orchestrator.skip(),
            SessionCommand::EndEarly => self.orchestrator.end_early(),
            SessionCommand::Reset => {
                let effects = self.orchestrator.reset();
                if self.orchestrator.phase() == Phase::Idle {
                    self.services.announcer.reset_fallback();
                }
                effects
            }
            SessionCommand::SetStyle(style) => {
                self.orchestrator.set_style(style);
                Vec::new()
            }
            SessionCommand::StartCheckin => {
                self.start_checkin();
                Vec::new()
            }
            SessionCommand::StopCheckin => {
                self.stop_checkin();
                Vec::new()
            }
            SessionCommand::Shutdown => Vec::new(),
        };
        self.perform(effects);
    }

    fn perform(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::PlayBell => self.play_bell(),
                Effect::Announce(text) => self.announce(text),
                Effect::StartTimers(stamp) => self.start_timers(stamp),
                Effect::StopTimers => self.stop_timers(),
                Effect::Finalize(snapshot) => self.finalize(snapshot),
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    fn play_bell(&self) {
        self.emit(SessionEvent::Bell);
        let sink = Arc::clone(&self.services.sink);
        tokio::spawn(async move {
            if let Err(e) = sink
                .play_samples(bell_tone(BELL_SAMPLE_RATE), BELL_SAMPLE_RATE)
                .await
            {
                warn!("Bell playback failed: {}", e);
            }
        });
    }

    fn announce(&self, text: String) {
        self.emit(SessionEvent::Announced(text.clone()));
        let announcer = self.services.announcer.clone();
        tokio::spawn(async move { announcer.announce(&text).await });
    }

    fn start_timers(&mut self, stamp: Stamp) {
        // Never two sets of timers at once
        self.stop_timers();

        let timing = &self.services.timing;
        self.timers.push(spawn_ticker(
            self.tx.clone(),
            timing.tick_interval(),
            stamp,
        ));

        if let Some(poller) = &self.services.poller {
            let category = self.orchestrator.run().current_drill().category;
            let stance = self.services.stance;
            let tx = self.tx.clone();
            let poller = poller.clone();
            let period = timing.poll_interval();
            let in_flight = Arc::new(AtomicBool::new(false));

            self.timers.push(tokio::spawn(async move {
                let mut interval = interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    if in_flight.swap(true, Ordering::SeqCst) {
                        debug!("Previous form analysis still running");
                        continue;
                    }
                    // Detached so a phase change never cancels the request itself
                    let tx = tx.clone();
                    let poller = poller.clone();
                    let in_flight = Arc::clone(&in_flight);
                    tokio::spawn(async move {
                        if let Some(feedback) = poller.poll_once(category, stance).await {
                            let _ = tx.send(Message::Feedback(stamp, feedback));
                        }
                        in_flight.store(false, Ordering::SeqCst);
                    });
                }
            }));
        }

        if let Some(checkin) = self.services.checkin.clone() {
            let period = checkin.config().auto_listen_every();
            if checkin.auto_listen_enabled() && period.is_zero() {
                warn!("Auto-listen cadence is zero, hands-free check-ins disabled");
            } else if checkin.auto_listen_enabled() {
                let run = self.orchestrator.run();
                let (style, difficulty) = (run.style, run.difficulty);
                let tx = self.tx.clone();

                self.timers.push(tokio::spawn(async move {
                    let mut interval = interval_at(Instant::now() + period, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        interval.tick().await;
                        if !checkin.can_auto_listen() {
                            continue;
                        }
                        let checkin = checkin.clone();
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            report_checkin(&tx, stamp, checkin.auto_capture(style, difficulty).await);
                        });
                    }
                }));
            }
        }

        debug!("Started {} timers", self.timers.len());
    }

    fn stop_timers(&mut self) {
        if self.timers.is_empty() {
            return;
        }
        debug!("Stopping {} timers", self.timers.len());
        for timer in self.timers.drain(..) {
            timer.abort();
        }
    }

    fn start_checkin(&self) {
        let Some(checkin) = self.services.checkin.clone() else {
            self.emit(SessionEvent::CheckinError(
                "Voice check-ins are not available".to_string(),
            ));
            return;
        };
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if let Err(e) = checkin.start_recording().await {
                let _ = tx.send(Message::CheckinFailed(e.user_message()));
            }
        });
    }

    fn stop_checkin(&self) {
        let Some(checkin) = self.services.checkin.clone() else {
            return;
        };
        let run = self.orchestrator.run();
        let (style, difficulty, stamp) = (run.style, run.difficulty, run.stamp());
        let tx = self.tx.clone();
        tokio::spawn(async move {
            report_checkin(&tx, stamp, checkin.stop_recording(style, difficulty).await);
        });
    }

    fn finalize(&self, snapshot: SessionSnapshot) {
        let recorder = self.services.recorder.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            match tokio::task::spawn_blocking(move || recorder.finalize(&snapshot)).await {
                Ok(record) => {
                    let _ = tx.send(Message::Recorded(record));
                }
                Err(e) => error!("Session recording task failed: {}", e),
            }
        });
    }
}

fn spawn_ticker(tx: mpsc::UnboundedSender<Message>, period: Duration, stamp: Stamp) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        // A late tick is applied once, never caught up in a burst
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if tx.send(Message::Tick(stamp)).is_err() {
                break;
            }
        }
    })
}

fn report_checkin(
    tx: &mpsc::UnboundedSender<Message>,
    stamp: Stamp,
    result: Result<Option<TranscriptLog>>,
) {
    match result {
        Ok(Some(log)) => {
            let _ = tx.send(Message::Transcript(stamp, log));
        }
        Ok(None) => {}
        Err(e) => {
            let _ = tx.send(Message::CheckinFailed(e.user_message()));
        }
    }
}
