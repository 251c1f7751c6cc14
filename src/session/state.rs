//! Session run state
//!
//! The run is owned by the orchestrator and mutated only from the session
//! control loop. Readers get a `SessionSnapshot` instead of a lock on the run.

use crate::drills::{Difficulty, Drill};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Session lifecycle phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// Not started
    #[default]
    Idle,
    /// Countdown ticking
    Running,
    /// Countdown frozen by the user
    Paused,
    /// Between rounds, waiting for the recovery checklist to be acknowledged
    ChecklistGate,
    /// Terminal
    Complete,
}

impl Phase {
    pub fn is_running(&self) -> bool {
        matches!(self, Phase::Running)
    }

    /// Phases from which the session can still be ended early
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Phase::Running | Phase::Paused | Phase::ChecklistGate)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::Running => write!(f, "Running"),
            Phase::Paused => write!(f, "Paused"),
            Phase::ChecklistGate => write!(f, "Checklist"),
            Phase::Complete => write!(f, "Complete"),
        }
    }
}

/// Coaching tone used for generated text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleProfile {
    #[default]
    Hype,
    Technical,
    Zen,
}

impl StyleProfile {
    pub fn label(&self) -> &'static str {
        match self {
            StyleProfile::Hype => "Hype",
            StyleProfile::Technical => "Technical",
            StyleProfile::Zen => "Zen",
        }
    }
}

impl FromStr for StyleProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hype" => Ok(StyleProfile::Hype),
            "technical" => Ok(StyleProfile::Technical),
            "zen" => Ok(StyleProfile::Zen),
            other => Err(format!("unknown style: {}", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackTone {
    Good,
    Adjust,
    #[default]
    Neutral,
}

/// Latest form feedback shown to the user
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub label: String,
    pub tone: FeedbackTone,
}

impl Feedback {
    pub fn new(label: impl Into<String>, tone: FeedbackTone) -> Self {
        Self {
            label: label.into(),
            tone,
        }
    }
}

/// Last voice check-in exchange
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptLog {
    pub transcript: String,
    pub reply: String,
}

pub const CHECKLIST_ITEMS: [&str; 4] = [
    "Slow your breathing",
    "Take a sip of water",
    "Shake out your shoulders",
    "Reset your stance",
];

/// Recovery checklist shown between rounds. Advisory only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Checklist {
    checked: [bool; CHECKLIST_ITEMS.len()],
}

impl Checklist {
    pub fn reset(&mut self) {
        self.checked = [false; CHECKLIST_ITEMS.len()];
    }

    /// Flip one item. Out-of-range indexes are ignored.
    pub fn toggle(&mut self, index: usize) -> bool {
        match self.checked.get_mut(index) {
            Some(item) => {
                *item = !*item;
                true
            }
            None => false,
        }
    }

    pub fn is_checked(&self, index: usize) -> bool {
        self.checked.get(index).copied().unwrap_or(false)
    }

    pub fn all_checked(&self) -> bool {
        self.checked.iter().all(|c| *c)
    }

    pub fn items(&self) -> impl Iterator<Item = (&'static str, bool)> + '_ {
        CHECKLIST_ITEMS.iter().copied().zip(self.checked.iter().copied())
    }
}

/// Stamp attached to async work at dispatch time.
///
/// `run` changes only when a new session run starts; `generation` changes on
/// every phase or drill change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Stamp {
    pub run: u64,
    pub generation: u64,
}

/// Live, in-memory state of one training session
#[derive(Clone, Debug)]
pub struct SessionRun {
    pub difficulty: Difficulty,
    pub drills: &'static [Drill],
    pub current_index: usize,
    pub time_remaining_secs: u32,
    pub elapsed_secs: u64,
    pub phase: Phase,
    pub style: StyleProfile,
    pub feedback: Option<Feedback>,
    pub transcript: Option<TranscriptLog>,
    pub checklist: Checklist,
    /// Adjust labels seen this run, used for the record's focus note
    pub focus_tally: HashMap<String, u32>,
    /// Set when the user ends the session before the last round finishes
    pub ended_early: bool,
    pub run_id: u64,
    pub generation: u64,
}

impl SessionRun {
    pub fn new(difficulty: Difficulty, style: StyleProfile) -> Self {
        let drills = difficulty.plan();
        Self {
            difficulty,
            drills,
            current_index: 0,
            time_remaining_secs: drills.first().map(|d| d.duration_secs).unwrap_or(0),
            elapsed_secs: 0,
            phase: Phase::Idle,
            style,
            feedback: None,
            transcript: None,
            checklist: Checklist::default(),
            focus_tally: HashMap::new(),
            ended_early: false,
            run_id: 0,
            generation: 0,
        }
    }

    pub fn current_drill(&self) -> &'static Drill {
        &self.drills[self.current_index]
    }

    pub fn next_drill(&self) -> Option<&'static Drill> {
        self.drills.get(self.current_index + 1)
    }

    pub fn is_last_drill(&self) -> bool {
        self.current_index + 1 >= self.drills.len()
    }

    pub fn total_rounds(&self) -> usize {
        self.drills.len()
    }

    pub fn stamp(&self) -> Stamp {
        Stamp {
            run: self.run_id,
            generation: self.generation,
        }
    }

    /// Invalidate all in-flight async work
    pub fn bump_generation(&mut self) -> Stamp {
        self.generation += 1;
        self.stamp()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            difficulty: self.difficulty,
            drills: self.drills,
            current_index: self.current_index,
            time_remaining_secs: self.time_remaining_secs,
            next_duration_secs: match self.phase {
                Phase::ChecklistGate => self.next_drill().map(|drill| drill.duration_secs),
                _ => None,
            },
            elapsed_secs: self.elapsed_secs,
            phase: self.phase,
            style: self.style,
            feedback: self.feedback.clone(),
            transcript: self.transcript.clone(),
            checklist: self.checklist.clone(),
            focus_tally: self.focus_tally.clone(),
            ended_early: self.ended_early,
        }
    }
}

/// Immutable copy of a session run
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub difficulty: Difficulty,
    pub drills: &'static [Drill],
    pub current_index: usize,
    pub time_remaining_secs: u32,
    /// Full duration of the round that follows, shown at the checklist gate
    pub next_duration_secs: Option<u32>,
    pub elapsed_secs: u64,
    pub phase: Phase,
    pub style: StyleProfile,
    pub feedback: Option<Feedback>,
    pub transcript: Option<TranscriptLog>,
    pub checklist: Checklist,
    pub focus_tally: HashMap<String, u32>,
    pub ended_early: bool,
}

impl SessionSnapshot {
    pub fn current_drill(&self) -> &'static Drill {
        &self.drills[self.current_index]
    }

    pub fn total_rounds(&self) -> usize {
        self.drills.len()
    }
}

/// Latest published snapshot, readable from any thread
#[derive(Clone)]
pub struct SharedSnapshot {
    inner: Arc<RwLock<SessionSnapshot>>,
}

impl SharedSnapshot {
    pub fn new(initial: SessionSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn publish(&self, snapshot: SessionSnapshot) {
        *self.inner.write() = snapshot;
    }

    /// Copy of the current snapshot (no lock held after return)
    pub fn get(&self) -> SessionSnapshot {
        self.inner.read().clone()
    }

    pub fn phase(&self) -> Phase {
        self.inner.read().phase
    }

    pub fn time_remaining_secs(&self) -> u32 {
        self.inner.read().time_remaining_secs
    }

    pub fn feedback(&self) -> Option<Feedback> {
        self.inner.read().feedback.clone()
    }
}
