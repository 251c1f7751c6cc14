//! Prompts and spoken coaching lines per style

use crate::drills::{Difficulty, Drill};
use crate::session::state::StyleProfile;

/// System prompt shared by every style
pub const COACH_SYSTEM_PROMPT: &str = r#"You are a boxing corner coach talking to a fighter mid-session. Your reply will be spoken aloud between punches, so:

1. Answer in one or two short sentences
2. No lists, no markdown, no emojis
3. Give one concrete cue the fighter can apply right now
4. Never tell the fighter to stop unless they mention pain or dizziness"#;

/// Fixed phrase used when the reply service fails
pub const FALLBACK_REPLY: &str = "Keep working, stay sharp. You've got this.";

impl StyleProfile {
    /// Tone instructions appended to the system prompt
    pub fn prompt(&self) -> &'static str {
        match self {
            StyleProfile::Hype => {
                "Be loud and energetic. Short punchy phrases, lots of encouragement."
            }
            StyleProfile::Technical => {
                "Be precise and calm. Name the body part and the correction."
            }
            StyleProfile::Zen => "Be calm and grounded. Focus on breath, rhythm and relaxation.",
        }
    }
}

impl Difficulty {
    /// Audience description for the reply model
    pub fn prompt(&self) -> &'static str {
        match self {
            Difficulty::Beginner => {
                "The fighter is a beginner. Use plain words and only basic punches (jab, cross)."
            }
            Difficulty::Intermediate => {
                "The fighter has some training. You may reference hooks, slips and footwork."
            }
            Difficulty::Advanced => {
                "The fighter trains regularly. Use ring vocabulary and push the pace."
            }
        }
    }
}

/// Full system prompt for a reply request
pub(crate) fn build_system_prompt(style_prompt: &str, difficulty_prompt: &str) -> String {
    format!(
        "{}\n\n## Tone\n\n{}\n\n## Fighter\n\n{}",
        COACH_SYSTEM_PROMPT, style_prompt, difficulty_prompt
    )
}

/// Spoken line when the session starts
pub fn welcome_line(style: StyleProfile, first: &Drill) -> String {
    match style {
        StyleProfile::Hype => format!(
            "Let's go champ! First up, {}. {}. Hands up and let's work!",
            first.name, first.description
        ),
        StyleProfile::Technical => format!(
            "Session starting. Round one: {}, {}. Focus: {}.",
            first.name,
            first.duration_label(),
            first.instructions.first().copied().unwrap_or(first.description)
        ),
        StyleProfile::Zen => format!(
            "Welcome. Breathe in, breathe out. We begin with {}. {}.",
            first.name, first.description
        ),
    }
}

/// Spoken line when a new round begins
pub fn drill_line(style: StyleProfile, round: usize, drill: &Drill) -> String {
    let tip = drill.instructions.first().copied().unwrap_or(drill.description);
    match style {
        StyleProfile::Hype => format!("Round {}! {}! {}. Let's go!", round, drill.name, tip),
        StyleProfile::Technical => format!(
            "Round {}: {}, {}. {}.",
            round,
            drill.name,
            drill.duration_label(),
            tip
        ),
        StyleProfile::Zen => format!("Round {}. {}. {}.", round, drill.name, tip),
    }
}

/// Spoken line when the session ends
pub fn closing_line(style: StyleProfile, rounds_completed: usize, total: usize) -> String {
    match style {
        StyleProfile::Hype => format!(
            "That's a wrap! {} of {} rounds done. Great work, champion!",
            rounds_completed, total
        ),
        StyleProfile::Technical => format!(
            "Session complete. {} of {} rounds. Review your notes.",
            rounds_completed, total
        ),
        StyleProfile::Zen => format!(
            "Well done. {} of {} rounds. Let your breath settle.",
            rounds_completed, total
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_includes_style_and_tier() {
        let prompt = build_system_prompt(StyleProfile::Zen.prompt(), Difficulty::Advanced.prompt());
        assert!(prompt.contains("corner coach"));
        assert!(prompt.contains(StyleProfile::Zen.prompt()));
        assert!(prompt.contains(Difficulty::Advanced.prompt()));
    }

    #[test]
    fn test_lines_name_the_drill() {
        let drill = &Difficulty::Beginner.plan()[1];
        for style in [StyleProfile::Hype, StyleProfile::Technical, StyleProfile::Zen] {
            assert!(welcome_line(style, drill).contains(drill.name));
            assert!(drill_line(style, 2, drill).contains(drill.name));
        }
    }

    #[test]
    fn test_closing_line_counts() {
        assert!(closing_line(StyleProfile::Technical, 2, 3).contains("2 of 3"));
    }
}
