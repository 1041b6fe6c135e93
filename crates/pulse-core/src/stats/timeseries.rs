use serde::{Deserialize, Serialize};

/// One calendar day of activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeseriesPoint {
    /// `YYYY-MM-DD` in the application's offset
    pub date: String,
    pub focus_seconds: i64,
    pub completed_pomodoros: u32,
    pub interruptions: u32,
}

impl TimeseriesPoint {
    pub(crate) fn empty(date: String) -> Self {
        Self {
            date,
            focus_seconds: 0,
            completed_pomodoros: 0,
            interruptions: 0,
        }
    }
}
