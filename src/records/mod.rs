//! Session results: building the record and keeping the history
//!
//! Persistence is best-effort. A failed write is logged and the record is
//! still returned so the results can be shown.

pub mod storage;
pub mod types;

pub use storage::{HandoffSlot, HistoryStore};
pub use types::{DrillSummary, SessionRecord};

use crate::config::StorageConfig;
use crate::session::state::SessionSnapshot;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

/// Rounds that count as completed for a terminal snapshot
pub fn rounds_completed(snapshot: &SessionSnapshot) -> usize {
    if snapshot.ended_early {
        snapshot.current_index
    } else {
        snapshot.total_rounds()
    }
}

/// Most frequent correction seen during the run, else the first tip of the
/// last drill reached
pub fn top_focus_note(snapshot: &SessionSnapshot) -> String {
    let most_frequent = snapshot
        .focus_tally
        .iter()
        .max_by(|(a_label, a_count), (b_label, b_count)| {
            a_count.cmp(b_count).then_with(|| b_label.cmp(a_label))
        })
        .map(|(label, _)| label.clone());

    most_frequent.unwrap_or_else(|| {
        snapshot
            .current_drill()
            .instructions
            .first()
            .map(|tip| tip.to_string())
            .unwrap_or_default()
    })
}

/// Build a record from a terminal snapshot
pub fn build_record(snapshot: &SessionSnapshot) -> SessionRecord {
    let rounds = rounds_completed(snapshot);
    SessionRecord {
        id: Uuid::new_v4(),
        total_elapsed_secs: snapshot.elapsed_secs,
        rounds_completed: rounds,
        total_rounds: snapshot.total_rounds(),
        style_label: snapshot.style.label().to_string(),
        difficulty: snapshot.difficulty,
        completed_drills: snapshot.drills[..rounds]
            .iter()
            .map(DrillSummary::from)
            .collect(),
        top_focus_note: top_focus_note(snapshot),
        timestamp: Utc::now(),
    }
}

/// Turns a finished session into a stored record
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    history: HistoryStore,
    handoff: HandoffSlot,
}

impl SessionRecorder {
    pub fn new(history: HistoryStore, handoff: HandoffSlot) -> Self {
        Self { history, handoff }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            HistoryStore::new(&config.history_path, config.history_cap),
            HandoffSlot::new(&config.handoff_path),
        )
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn handoff(&self) -> &HandoffSlot {
        &self.handoff
    }

    /// Build the record and persist it. Never fails.
    pub fn finalize(&self, snapshot: &SessionSnapshot) -> SessionRecord {
        let record = build_record(snapshot);
        info!(
            "Session finished: {}/{} rounds in {}",
            record.rounds_completed,
            record.total_rounds,
            record.duration_label()
        );

        if let Err(e) = self.history.prepend(record.clone()) {
            warn!("Could not save session history: {}", e);
        }
        if let Err(e) = self.handoff.put(&record) {
            warn!("Could not write session hand-off: {}", e);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drills::Difficulty;
    use crate::session::state::{SessionRun, StyleProfile};

    fn terminal(index: usize, ended_early: bool) -> SessionSnapshot {
        let mut run = SessionRun::new(Difficulty::Beginner, StyleProfile::Technical);
        run.current_index = index;
        run.ended_early = ended_early;
        run.elapsed_secs = 200;
        run.snapshot()
    }

    #[test]
    fn test_rounds_on_early_end() {
        for k in 0..3 {
            let record = build_record(&terminal(k, true));
            assert_eq!(record.rounds_completed, k);
            assert_eq!(record.completed_drills.len(), k);
        }
    }

    #[test]
    fn test_rounds_on_natural_completion() {
        let record = build_record(&terminal(2, false));
        assert_eq!(record.rounds_completed, 3);
        assert_eq!(record.total_rounds, 3);
        assert!(record.is_complete());
        assert_eq!(record.style_label, "Technical");
    }

    #[test]
    fn test_focus_note_prefers_corrections() {
        let mut run = SessionRun::new(Difficulty::Beginner, StyleProfile::Hype);
        run.focus_tally.insert("Hands up".to_string(), 2);
        run.focus_tally.insert("Chin down".to_string(), 5);
        run.focus_tally.insert("Bend your knees".to_string(), 5);
        run.ended_early = true;

        // Ties resolve alphabetically
        assert_eq!(top_focus_note(&run.snapshot()), "Bend your knees");
    }

    #[test]
    fn test_focus_note_falls_back_to_drill_tip() {
        let snapshot = terminal(1, true);
        assert_eq!(
            top_focus_note(&snapshot),
            Difficulty::Beginner.plan()[1].instructions[0]
        );
    }

    #[test]
    fn test_finalize_persists() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = SessionRecorder::from_config(&StorageConfig::in_dir(dir.path()));

        let record = recorder.finalize(&terminal(2, false));
        let history = recorder.history().load().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, record.id);
        assert_eq!(recorder.handoff().take().unwrap().unwrap().id, record.id);
    }

    #[test]
    fn test_finalize_survives_storage_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the history file should be makes every write fail
        let blocked = dir.path().join("history.json");
        std::fs::create_dir_all(blocked.join("x")).unwrap();
        let recorder = SessionRecorder::new(
            HistoryStore::new(&blocked, 20),
            HandoffSlot::new(&blocked),
        );

        let record = recorder.finalize(&terminal(1, true));
        assert_eq!(record.rounds_completed, 1);
    }
}
