use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::phase::TimerPhase;
use crate::storage::AppSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
        };
        write!(f, "{label}")
    }
}

/// The single current timer.
///
/// `remaining_seconds` is a checkpoint taken at the last mutation. While running,
/// the live value is `remaining_seconds - (now - started_at)`; see
/// [`TimerEngine::snapshot`](super::TimerEngine::snapshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub phase: TimerPhase,
    pub cycle_index: u32,
    pub status: TimerStatus,
    pub is_running: bool,
    /// Epoch seconds of the last start or resume. `None` unless running.
    pub started_at: Option<i64>,
    pub remaining_seconds: i64,
    /// Configured duration of the current interval, frozen when it starts.
    pub phase_total_seconds: i64,
    /// Epoch seconds when the current interval first started.
    #[serde(default)]
    pub interval_started_at: Option<i64>,
    pub interruptions: u32,
    pub project_id: Option<i64>,
    pub tag_id: Option<i64>,
}

impl TimerState {
    pub fn initial(settings: &AppSettings) -> Self {
        let phase = TimerPhase::Focus;
        let phase_total_seconds = settings.duration_for_phase_seconds(phase);
        Self {
            phase,
            cycle_index: 0,
            status: TimerStatus::Idle,
            is_running: false,
            started_at: None,
            remaining_seconds: phase_total_seconds,
            phase_total_seconds,
            interval_started_at: None,
            interruptions: 0,
            project_id: None,
            tag_id: None,
        }
    }

    pub(crate) fn set_status(&mut self, status: TimerStatus) {
        self.status = status;
        self.is_running = status == TimerStatus::Running;
    }

    /// Repair a state loaded from storage so the running invariant holds.
    pub fn normalized(mut self, settings: &AppSettings) -> Self {
        if self.phase_total_seconds <= 0 {
            self.phase_total_seconds = settings.duration_for_phase_seconds(self.phase);
        }
        self.remaining_seconds = self.remaining_seconds.clamp(0, self.phase_total_seconds);
        self.cycle_index %= settings.long_break_every.max(1);

        match self.status {
            TimerStatus::Running if self.started_at.is_none() => {
                self.set_status(TimerStatus::Paused);
            }
            TimerStatus::Idle => {
                self.phase_total_seconds = settings.duration_for_phase_seconds(self.phase);
                self.remaining_seconds = self.phase_total_seconds;
                self.started_at = None;
                self.interval_started_at = None;
                self.interruptions = 0;
                self.set_status(TimerStatus::Idle);
            }
            TimerStatus::Paused => {
                self.started_at = None;
                self.set_status(TimerStatus::Paused);
            }
            status => self.set_status(status),
        }
        self
    }
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Project/tag binding for the current interval.
///
/// Each field distinguishes three cases:
/// - absent (`None`): keep the current binding
/// - explicit `null` (`Some(None)`): clear it
/// - a value (`Some(Some(id))`): bind to that id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextRequest {
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub project_id: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub tag_id: Option<Option<i64>>,
}

impl ContextRequest {
    pub fn bind(project_id: Option<i64>, tag_id: Option<i64>) -> Self {
        Self {
            project_id: Some(project_id),
            tag_id: Some(tag_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.project_id.is_none() && self.tag_id.is_none()
    }

    /// Apply to `state`. Returns true when the binding changed.
    pub(crate) fn apply(&self, state: &mut TimerState) -> bool {
        let mut changed = false;
        if let Some(project_id) = self.project_id {
            changed |= state.project_id != project_id;
            state.project_id = project_id;
        }
        if let Some(tag_id) = self.tag_id {
            changed |= state.tag_id != tag_id;
            state.tag_id = tag_id;
        }
        changed
    }
}

/// Payload of `timer_start`: an optional context plus an optional phase override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    #[serde(flatten)]
    pub context: ContextRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<TimerPhase>,
}

impl From<ContextRequest> for StartRequest {
    fn from(context: ContextRequest) -> Self {
        Self {
            context,
            phase: None,
        }
    }
}
