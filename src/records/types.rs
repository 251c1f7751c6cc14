use crate::drills::{Difficulty, Drill, DrillCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A drill that was finished during a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrillSummary {
    pub name: String,
    pub category: DrillCategory,
    pub duration_secs: u32,
}

impl From<&Drill> for DrillSummary {
    fn from(drill: &Drill) -> Self {
        Self {
            name: drill.name.to_string(),
            category: drill.category,
            duration_secs: drill.duration_secs,
        }
    }
}

/// Persisted result of one session. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub total_elapsed_secs: u64,
    pub rounds_completed: usize,
    pub total_rounds: usize,
    pub style_label: String,
    pub difficulty: Difficulty,
    pub completed_drills: Vec<DrillSummary>,
    pub top_focus_note: String,
    pub timestamp: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_complete(&self) -> bool {
        self.rounds_completed == self.total_rounds
    }

    /// Elapsed time as `Xm Ys`
    pub fn duration_label(&self) -> String {
        format!(
            "{}m {}s",
            self.total_elapsed_secs / 60,
            self.total_elapsed_secs % 60
        )
    }

    /// Short text for the results view
    pub fn summary_text(&self) -> String {
        let mut lines = vec![
            format!(
                "{} session, {} style: {} of {} rounds in {}",
                self.difficulty,
                self.style_label,
                self.rounds_completed,
                self.total_rounds,
                self.duration_label()
            ),
            format!("Focus next time: {}", self.top_focus_note),
        ];
        for drill in &self.completed_drills {
            lines.push(format!("- {} ({})", drill.name, drill.category.label()));
        }
        lines.join("\n")
    }
}
