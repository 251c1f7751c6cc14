//! Session state machine
//!
//! The orchestrator owns the `SessionRun` and advances it with a single
//! `on_tick` event plus explicit commands. It never performs IO itself: every
//! transition returns the `Effect`s the runtime has to carry out (bell,
//! announcement, timer start/stop, finalization). Commands that are not valid
//! in the current phase are logged and ignored.

use crate::coach::prompts::{closing_line, drill_line, welcome_line};
use crate::drills::Difficulty;
use crate::session::state::{
    Feedback, FeedbackTone, Phase, SessionRun, SessionSnapshot, Stamp, StyleProfile,
    TranscriptLog,
};
use tracing::{debug, info, warn};

/// Side effect requested by a transition
#[derive(Clone, Debug)]
pub enum Effect {
    /// Ring the round bell
    PlayBell,
    /// Speak a coaching line
    Announce(String),
    /// Start the tick, poll and auto-listen timers for this stamp
    StartTimers(Stamp),
    /// Cancel every live timer
    StopTimers,
    /// Persist the terminal state
    Finalize(SessionSnapshot),
}

/// Drives one session run through its phases
pub struct SessionOrchestrator {
    run: SessionRun,
    finalized: bool,
}

impl SessionOrchestrator {
    pub fn new(difficulty: Difficulty, style: StyleProfile) -> Self {
        Self {
            run: SessionRun::new(difficulty, style),
            finalized: false,
        }
    }

    pub fn run(&self) -> &SessionRun {
        &self.run
    }

    pub fn phase(&self) -> Phase {
        self.run.phase
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.run.snapshot()
    }

    pub fn stamp(&self) -> Stamp {
        self.run.stamp()
    }

    fn enter(&mut self, phase: Phase) -> Stamp {
        info!("Session phase {} -> {}", self.run.phase, phase);
        self.run.phase = phase;
        self.run.bump_generation()
    }

    fn ignored(&self, command: &str) -> Vec<Effect> {
        warn!("Ignoring {} while {}", command, self.run.phase);
        Vec::new()
    }

    /// Begin the session: first drill, bell, welcome line, timers
    pub fn start(&mut self) -> Vec<Effect> {
        if self.run.phase != Phase::Idle {
            return self.ignored("start");
        }

        self.run.current_index = 0;
        self.run.time_remaining_secs = self.run.current_drill().duration_secs;
        self.run.elapsed_secs = 0;
        self.run.checklist.reset();
        let stamp = self.enter(Phase::Running);

        vec![
            Effect::PlayBell,
            Effect::Announce(welcome_line(self.run.style, self.run.current_drill())),
            Effect::StartTimers(stamp),
        ]
    }

    /// One second of round time
    pub fn on_tick(&mut self) -> Vec<Effect> {
        if self.run.phase != Phase::Running {
            debug!("Tick ignored while {}", self.run.phase);
            return Vec::new();
        }

        self.run.time_remaining_secs = self.run.time_remaining_secs.saturating_sub(1);
        self.run.elapsed_secs += 1;

        if self.run.time_remaining_secs == 0 {
            self.complete_round()
        } else {
            Vec::new()
        }
    }

    fn complete_round(&mut self) -> Vec<Effect> {
        self.run.time_remaining_secs = 0;
        let drill = self.run.current_drill();
        info!(
            "Round {} ({}) complete",
            self.run.current_index + 1,
            drill.name
        );

        if self.run.is_last_drill() {
            let mut effects = vec![Effect::PlayBell];
            effects.extend(self.finish());
            effects
        } else {
            self.run.checklist.reset();
            self.enter(Phase::ChecklistGate);
            vec![Effect::StopTimers, Effect::PlayBell]
        }
    }

    fn finish(&mut self) -> Vec<Effect> {
        self.enter(Phase::Complete);

        let mut effects = vec![Effect::StopTimers];
        let rounds = if self.run.ended_early {
            self.run.current_index
        } else {
            self.run.total_rounds()
        };
        effects.push(Effect::Announce(closing_line(
            self.run.style,
            rounds,
            self.run.total_rounds(),
        )));

        if !self.finalized {
            self.finalized = true;
            effects.push(Effect::Finalize(self.run.snapshot()));
        }
        effects
    }

    pub fn pause(&mut self) -> Vec<Effect> {
        if self.run.phase != Phase::Running {
            return self.ignored("pause");
        }
        self.enter(Phase::Paused);
        vec![Effect::StopTimers]
    }

    pub fn resume(&mut self) -> Vec<Effect> {
        if self.run.phase != Phase::Paused {
            return self.ignored("resume");
        }
        let stamp = self.enter(Phase::Running);
        vec![Effect::StartTimers(stamp)]
    }

    /// Pause when running, resume when paused
    pub fn toggle_pause(&mut self) -> Vec<Effect> {
        match self.run.phase {
            Phase::Running => self.pause(),
            Phase::Paused => self.resume(),
            _ => self.ignored("toggle pause"),
        }
    }

    /// Leave the checklist gate and start the next round.
    ///
    /// Unchecked items do not block progress.
    pub fn acknowledge_checklist(&mut self) -> Vec<Effect> {
        if self.run.phase != Phase::ChecklistGate {
            return self.ignored("checklist acknowledgement");
        }
        if !self.run.checklist.all_checked() {
            debug!("Continuing with an incomplete checklist");
        }

        self.run.current_index += 1;
        let drill = self.run.current_drill();
        self.run.time_remaining_secs = drill.duration_secs;
        let stamp = self.enter(Phase::Running);

        vec![
            Effect::Announce(drill_line(self.run.style, self.run.current_index + 1, drill)),
            Effect::PlayBell,
            Effect::StartTimers(stamp),
        ]
    }

    /// Complete the current round immediately
    pub fn skip(&mut self) -> Vec<Effect> {
        match self.run.phase {
            Phase::Running | Phase::Paused => self.complete_round(),
            _ => self.ignored("skip"),
        }
    }

    /// Stop the session now; the round in progress does not count
    pub fn end_early(&mut self) -> Vec<Effect> {
        if !self.run.phase.is_in_progress() {
            return self.ignored("end early");
        }
        self.run.ended_early = true;
        self.finish()
    }

    /// Discard the finished run and prepare a fresh one
    pub fn reset(&mut self) -> Vec<Effect> {
        if self.run.phase != Phase::Complete {
            return self.ignored("reset");
        }

        let mut fresh = SessionRun::new(self.run.difficulty, self.run.style);
        fresh.run_id = self.run.run_id + 1;
        fresh.generation = self.run.generation + 1;
        self.run = fresh;
        self.finalized = false;
        info!("Session reset");
        Vec::new()
    }

    /// Change the coaching tone. Allowed in every phase.
    pub fn set_style(&mut self, style: StyleProfile) {
        debug!("Style set to {}", style.label());
        self.run.style = style;
    }

    /// Flip a checklist item; only meaningful at the gate
    pub fn toggle_checklist_item(&mut self, index: usize) -> bool {
        if self.run.phase != Phase::ChecklistGate {
            debug!("Checklist toggle ignored while {}", self.run.phase);
            return false;
        }
        self.run.checklist.toggle(index)
    }

    /// Whether a tick dispatched with `stamp` should still be applied
    pub fn accepts_tick(&self, stamp: Stamp) -> bool {
        self.run.phase == Phase::Running && stamp == self.run.stamp()
    }

    /// Apply an analysis result unless it is stale
    pub fn apply_feedback(&mut self, stamp: Stamp, feedback: Feedback) -> bool {
        if self.run.phase != Phase::Running || stamp != self.run.stamp() {
            debug!("Discarding stale feedback: {}", feedback.label);
            return false;
        }
        if feedback.tone == FeedbackTone::Adjust {
            *self.run.focus_tally.entry(feedback.label.clone()).or_insert(0) += 1;
        }
        self.run.feedback = Some(feedback);
        true
    }

    /// Apply a check-in exchange unless the run it belongs to is gone
    pub fn apply_transcript(&mut self, stamp: Stamp, log: TranscriptLog) -> bool {
        if stamp.run != self.run.run_id || self.run.phase == Phase::Idle {
            debug!("Discarding check-in from a previous run");
            return false;
        }
        self.run.transcript = Some(log);
        true
    }
}
