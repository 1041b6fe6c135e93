//! Range summaries and focus streaks.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Aggregate view of one date range. Derived, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    /// Sum of `durationSec` over Focus sessions
    pub total_focus_sec: i64,
    /// Number of Focus sessions
    pub completed_pomodoros: u32,
    /// Consecutive days with focus, ending at the anchor day
    pub streak_days: u32,
    /// Sum of interruptions over all sessions
    pub interruptions: u32,
    /// `total_focus_sec` spread over every day of the range
    pub avg_daily_focus_sec: i64,
}

/// Count consecutive days in `focus_days` ending at `anchor`, walking backward until
/// the first day without focus.
pub fn streak_days(focus_days: &BTreeSet<NaiveDate>, anchor: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut day = anchor;
    while focus_days.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}
