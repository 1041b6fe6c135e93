use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    Focus,
    ShortBreak,
    LongBreak,
}

impl TimerPhase {
    /// Value stored in the `sessions.phase` column and written to exports.
    pub fn as_db_value(&self) -> &'static str {
        match self {
            TimerPhase::Focus => "focus",
            TimerPhase::ShortBreak => "short_break",
            TimerPhase::LongBreak => "long_break",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value.trim_matches('"') {
            "focus" => Some(TimerPhase::Focus),
            "short_break" => Some(TimerPhase::ShortBreak),
            "long_break" => Some(TimerPhase::LongBreak),
            _ => None,
        }
    }

    pub fn is_focus(&self) -> bool {
        matches!(self, TimerPhase::Focus)
    }
}

impl fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimerPhase::Focus => "Focus",
            TimerPhase::ShortBreak => "Short break",
            TimerPhase::LongBreak => "Long break",
        };
        write!(f, "{label}")
    }
}

impl FromStr for TimerPhase {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::from_db_value(&normalized).ok_or_else(|| ValidationError::InvalidValue {
            field: "phase".into(),
            message: format!("unknown timer phase: {s}"),
        })
    }
}

/// Compute the phase that follows `current`.
///
/// After a focus interval the cycle index counts one more completed focus; when that
/// count reaches `cycle_length` the next phase is a long break and the index wraps to 0.
/// Breaks always return to focus with the index unchanged. A zero `cycle_length`
/// behaves like 1.
pub fn next_phase(current: TimerPhase, cycle_index: u32, cycle_length: u32) -> (TimerPhase, u32) {
    let cycle_length = cycle_length.max(1);
    match current {
        TimerPhase::Focus => {
            let completed = cycle_index.saturating_add(1);
            if completed % cycle_length == 0 {
                (TimerPhase::LongBreak, 0)
            } else {
                (TimerPhase::ShortBreak, completed)
            }
        }
        TimerPhase::ShortBreak | TimerPhase::LongBreak => (TimerPhase::Focus, cycle_index),
    }
}
