use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::TimerPhase;

/// Every timer transition produces an Event.
/// The presentation layer polls for them; `PhaseCompleted` is the "phase ended" signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        phase: TimerPhase,
        duration_secs: i64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: i64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_secs: i64,
        at: DateTime<Utc>,
    },
    PhaseCompleted {
        completed_phase: TimerPhase,
        next_phase: TimerPhase,
        /// True when the interval was cut short by a skip.
        skipped: bool,
        at: DateTime<Utc>,
    },
    ContextChanged {
        project_id: Option<i64>,
        tag_id: Option<i64>,
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    DataReset {
        at: DateTime<Utc>,
    },
}

/// Convert epoch seconds from the clock into an event timestamp.
pub(crate) fn timestamp(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}
