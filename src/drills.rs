//! Drill plans per difficulty tier
//!
//! Every tier maps to a fixed, ordered sequence of drills. The tables are
//! static and never mutated at runtime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of work a drill trains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrillCategory {
    Warmup,
    Technique,
    Combo,
    Cooldown,
}

impl DrillCategory {
    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            DrillCategory::Warmup => "Warm Up",
            DrillCategory::Technique => "Technique",
            DrillCategory::Combo => "Combination",
            DrillCategory::Cooldown => "Cool Down",
        }
    }

    /// Identifier sent to the form analyzer
    pub fn as_str(&self) -> &'static str {
        match self {
            DrillCategory::Warmup => "warmup",
            DrillCategory::Technique => "technique",
            DrillCategory::Combo => "combo",
            DrillCategory::Cooldown => "cooldown",
        }
    }
}

/// One timed unit of a training sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drill {
    pub id: u32,
    pub name: &'static str,
    pub description: &'static str,
    pub duration_secs: u32,
    pub category: DrillCategory,
    pub instructions: &'static [&'static str],
}

impl Drill {
    /// Duration formatted as `m:ss`
    pub fn duration_label(&self) -> String {
        format!("{}:{:02}", self.duration_secs / 60, self.duration_secs % 60)
    }
}

const SHADOW_BOXING: Drill = Drill {
    id: 1,
    name: "Shadow Boxing",
    description: "Freestyle movement, focus on form",
    duration_secs: 180,
    category: DrillCategory::Warmup,
    instructions: &[
        "Stay light on the balls of your feet",
        "Keep your hands up by your cheeks",
        "Breathe out on every punch",
    ],
};

const JAB_CROSS: Drill = Drill {
    id: 2,
    name: "Jab-Cross Combos",
    description: "Basic 1-2 combinations",
    duration_secs: 120,
    category: DrillCategory::Technique,
    instructions: &[
        "Snap the jab straight back to your guard",
        "Rotate the rear hip into the cross",
        "Keep your chin tucked behind your shoulder",
    ],
};

const SPEED_DRILL: Drill = Drill {
    id: 3,
    name: "Speed Drill",
    description: "Maximum punch output",
    duration_secs: 60,
    category: DrillCategory::Combo,
    instructions: &[
        "Short, fast straights",
        "Stay relaxed through the shoulders",
        "Don't let the hands drop when you tire",
    ],
};

const DEFENSE_SLIPS: Drill = Drill {
    id: 4,
    name: "Defense & Slips",
    description: "Head movement practice",
    duration_secs: 120,
    category: DrillCategory::Technique,
    instructions: &[
        "Slip by bending the knees, not the waist",
        "Eyes on your opponent the whole time",
        "Return fire after every slip",
    ],
};

const BODY_HEAD_COMBOS: Drill = Drill {
    id: 5,
    name: "Body-Head Combos",
    description: "Level changes into the 1-2-3",
    duration_secs: 120,
    category: DrillCategory::Combo,
    instructions: &[
        "Drop your level with the legs",
        "Finish every combination with your guard up",
        "Step out at an angle after the hook",
    ],
};

const COOL_DOWN: Drill = Drill {
    id: 6,
    name: "Cool Down",
    description: "Stretching and breathing",
    duration_secs: 120,
    category: DrillCategory::Cooldown,
    instructions: &[
        "Slow nasal breathing",
        "Stretch shoulders and hips",
        "Let your heart rate come down",
    ],
};

const BEGINNER_PLAN: &[Drill] = &[SHADOW_BOXING, JAB_CROSS, COOL_DOWN];
const INTERMEDIATE_PLAN: &[Drill] = &[SHADOW_BOXING, JAB_CROSS, DEFENSE_SLIPS, COOL_DOWN];
const ADVANCED_PLAN: &[Drill] = &[
    SHADOW_BOXING,
    JAB_CROSS,
    SPEED_DRILL,
    DEFENSE_SLIPS,
    BODY_HEAD_COMBOS,
    COOL_DOWN,
];

/// Training tier, fixed for the duration of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// Ordered drill sequence for this tier
    pub fn plan(&self) -> &'static [Drill] {
        match self {
            Difficulty::Beginner => BEGINNER_PLAN,
            Difficulty::Intermediate => INTERMEDIATE_PLAN,
            Difficulty::Advanced => ADVANCED_PLAN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" | "pro" => Ok(Difficulty::Advanced),
            other => Err(format!("unknown difficulty: {}", other)),
        }
    }
}

/// Lead side the user fights from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    #[default]
    Orthodox,
    Southpaw,
}

impl Stance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::Orthodox => "orthodox",
            Stance::Southpaw => "southpaw",
        }
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "orthodox" => Ok(Stance::Orthodox),
            "southpaw" => Ok(Stance::Southpaw),
            other => Err(format!("unknown stance: {}", other)),
        }
    }
}
