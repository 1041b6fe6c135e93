//! Timer engine implementation.
//!
//! The engine is a wall-clock-based state machine over a single [`TimerState`].
//! There is no ticking thread: every command receives `now` (epoch seconds) from the
//! caller's [`Clock`](crate::Clock) and first *settles* the timer, closing an interval
//! whose live remaining time already reached zero.
//!
//! ## State Transitions
//!
//! ```text
//! Idle --start--> Running --pause--> Paused --resume--> Running
//!                    |                  |
//!                    +------skip--------+--> Idle | Running (auto-advance)
//! ```
//!
//! The engine performs no I/O. Closed intervals are handed back in a
//! [`Transition`] so the caller can persist them together with the new state and
//! only then adopt it.

use serde::{Deserialize, Serialize};

use super::phase::{next_phase, TimerPhase};
use super::state::{ContextRequest, StartRequest, TimerState, TimerStatus};
use crate::error::{CoreError, Result};
use crate::events::{timestamp, Event};
use crate::storage::{AppSettings, NewSession};

/// Output of a timer command: intervals that closed and events that fired.
#[derive(Debug, Default)]
pub struct Transition {
    pub closed: Vec<NewSession>,
    pub events: Vec<Event>,
}

/// Core timer engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerEngine {
    state: TimerState,
}

impl TimerEngine {
    pub fn new(settings: &AppSettings) -> Self {
        Self {
            state: TimerState::initial(settings),
        }
    }

    /// Adopt a previously persisted state.
    pub fn from_state(state: TimerState, settings: &AppSettings) -> Self {
        Self {
            state: state.normalized(settings),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// The stored checkpoint, without live recomputation.
    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn status(&self) -> TimerStatus {
        self.state.status
    }

    /// Remaining seconds as of `now`, never negative.
    pub fn live_remaining(&self, now: i64) -> i64 {
        match (self.state.status, self.state.started_at) {
            (TimerStatus::Running, Some(started_at)) => {
                let elapsed = (now - started_at).max(0);
                (self.state.remaining_seconds - elapsed).max(0)
            }
            _ => self.state.remaining_seconds.max(0),
        }
    }

    /// Read-only projection with the live countdown applied.
    pub fn snapshot(&self, now: i64) -> TimerState {
        let mut view = self.state.clone();
        view.remaining_seconds = self.live_remaining(now);
        view
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Close the interval if it ran out while nobody was looking.
    pub fn settle(&mut self, settings: &AppSettings, now: i64) -> Transition {
        let mut transition = Transition::default();
        self.settle_into(settings, now, &mut transition);
        transition
    }

    pub fn start(
        &mut self,
        request: Option<StartRequest>,
        settings: &AppSettings,
        now: i64,
    ) -> Result<Transition> {
        let mut transition = self.settle(settings, now);
        let request = request.unwrap_or_default();

        match self.state.status {
            TimerStatus::Idle => {
                if let Some(phase) = request.phase {
                    self.state.phase = phase;
                }
                request.context.apply(&mut self.state);
                self.begin_interval(settings, now, &mut transition);
            }
            TimerStatus::Running | TimerStatus::Paused => {
                self.rebind(&request.context, now, &mut transition);
            }
        }
        Ok(transition)
    }

    pub fn pause(&mut self, settings: &AppSettings, now: i64) -> Result<Transition> {
        let mut transition = self.settle(settings, now);
        if self.state.status != TimerStatus::Running {
            return Err(self.invalid("pause"));
        }

        self.state.remaining_seconds = self.live_remaining(now);
        self.state.started_at = None;
        self.state.interruptions += 1;
        self.state.set_status(TimerStatus::Paused);
        tracing::debug!(
            remaining = self.state.remaining_seconds,
            interruptions = self.state.interruptions,
            "timer paused"
        );
        transition.events.push(Event::TimerPaused {
            remaining_secs: self.state.remaining_seconds,
            at: timestamp(now),
        });
        Ok(transition)
    }

    pub fn resume(
        &mut self,
        request: Option<ContextRequest>,
        settings: &AppSettings,
        now: i64,
    ) -> Result<Transition> {
        let mut transition = self.settle(settings, now);
        if self.state.status != TimerStatus::Paused {
            return Err(self.invalid("resume"));
        }

        if let Some(context) = request {
            self.rebind(&context, now, &mut transition);
        }

        if self.state.remaining_seconds <= 0 {
            tracing::debug!("resumed an expired interval, closing it");
            self.close_interval(settings, now, true, now, &mut transition);
            return Ok(transition);
        }

        self.state.started_at = Some(now);
        self.state.set_status(TimerStatus::Running);
        transition.events.push(Event::TimerResumed {
            remaining_secs: self.state.remaining_seconds,
            at: timestamp(now),
        });
        Ok(transition)
    }

    /// End the current interval early.
    ///
    /// When settling already closed an expired interval, that close is the answer to
    /// the skip and nothing further is recorded.
    pub fn skip(&mut self, settings: &AppSettings, now: i64) -> Result<Transition> {
        let mut transition = self.settle(settings, now);
        if !transition.closed.is_empty() {
            tracing::debug!("interval expired before skip, nothing left to skip");
            return Ok(transition);
        }
        if self.state.status == TimerStatus::Idle {
            return Err(self.invalid("skip"));
        }
        self.close_interval(settings, now, false, now, &mut transition);
        Ok(transition)
    }

    pub fn set_context(
        &mut self,
        context: &ContextRequest,
        settings: &AppSettings,
        now: i64,
    ) -> Transition {
        let mut transition = self.settle(settings, now);
        self.rebind(context, now, &mut transition);
        transition
    }

    /// Return to the first focus of a fresh cycle, keeping the context binding.
    ///
    /// An interval in progress with any elapsed time is flushed as a skipped record.
    pub fn reset(&mut self, settings: &AppSettings, now: i64) -> Transition {
        let mut transition = self.settle(settings, now);

        if self.state.status != TimerStatus::Idle {
            let remaining = self.live_remaining(now);
            if self.state.phase_total_seconds - remaining > 0 {
                transition.closed.push(self.session_draft(now, remaining, false));
            }
        }

        let mut fresh = TimerState::initial(settings);
        fresh.project_id = self.state.project_id;
        fresh.tag_id = self.state.tag_id;
        self.state = fresh;
        transition.events.push(Event::TimerReset { at: timestamp(now) });
        transition
    }

    /// Re-read configured durations for an interval that has not started yet.
    pub fn sync_settings(&mut self, settings: &AppSettings) {
        self.state.cycle_index %= settings.long_break_every.max(1);
        if self.state.status == TimerStatus::Idle {
            self.state.phase_total_seconds = settings.duration_for_phase_seconds(self.state.phase);
            self.state.remaining_seconds = self.state.phase_total_seconds;
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn invalid(&self, action: &'static str) -> CoreError {
        CoreError::InvalidTransition {
            action,
            status: self.state.status,
        }
    }

    fn settle_into(&mut self, settings: &AppSettings, now: i64, transition: &mut Transition) {
        let Some(started_at) = self.state.started_at else {
            return;
        };
        if self.state.status != TimerStatus::Running || self.live_remaining(now) > 0 {
            return;
        }
        let expired_at = started_at + self.state.remaining_seconds.max(0);
        self.close_interval(settings, expired_at, true, now, transition);
    }

    fn begin_interval(&mut self, settings: &AppSettings, now: i64, transition: &mut Transition) {
        let total = settings.duration_for_phase_seconds(self.state.phase);
        self.state.phase_total_seconds = total;
        self.state.remaining_seconds = total;
        self.state.started_at = Some(now);
        self.state.interval_started_at = Some(now);
        self.state.interruptions = 0;
        self.state.set_status(TimerStatus::Running);
        tracing::debug!(phase = %self.state.phase, total, "interval started");
        transition.events.push(Event::TimerStarted {
            phase: self.state.phase,
            duration_secs: total,
            at: timestamp(now),
        });
    }

    fn rebind(&mut self, context: &ContextRequest, now: i64, transition: &mut Transition) {
        if context.apply(&mut self.state) {
            transition.events.push(Event::ContextChanged {
                project_id: self.state.project_id,
                tag_id: self.state.tag_id,
                at: timestamp(now),
            });
        }
    }

    fn session_draft(&self, ended_at: i64, remaining: i64, completed: bool) -> NewSession {
        let total = self.state.phase_total_seconds.max(0);
        let duration_sec = (total - remaining).clamp(0, total);
        NewSession {
            phase: self.state.phase,
            started_at: self
                .state
                .interval_started_at
                .unwrap_or(ended_at - duration_sec),
            ended_at,
            duration_sec,
            completed,
            interruptions: self.state.interruptions,
            project_id: self.state.project_id,
            tag_id: self.state.tag_id,
        }
    }

    /// The one path that turns the current interval into a session record.
    ///
    /// Shared by skip, natural completion and resume-after-expiry. `ended_at` is
    /// when the interval stopped counting; `now` is when an auto-advanced phase starts.
    fn close_interval(
        &mut self,
        settings: &AppSettings,
        ended_at: i64,
        completed: bool,
        now: i64,
        transition: &mut Transition,
    ) {
        let remaining = if completed {
            0
        } else {
            self.live_remaining(ended_at)
        };
        let draft = self.session_draft(ended_at, remaining, completed);
        let finished = self.state.phase;
        let (phase, cycle_index) =
            next_phase(finished, self.state.cycle_index, settings.long_break_every);

        transition.closed.push(draft);
        transition.events.push(Event::PhaseCompleted {
            completed_phase: finished,
            next_phase: phase,
            skipped: !completed,
            at: timestamp(ended_at),
        });

        self.state.phase = phase;
        self.state.cycle_index = cycle_index;
        self.state.started_at = None;
        self.state.interval_started_at = None;
        self.state.interruptions = 0;
        self.state.set_status(TimerStatus::Idle);

        if settings.auto_advance {
            self.begin_interval(settings, now, transition);
        } else {
            self.state.phase_total_seconds = settings.duration_for_phase_seconds(phase);
            self.state.remaining_seconds = self.state.phase_total_seconds;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const T0: i64 = 1_700_000_000;

    fn manual_settings() -> AppSettings {
        AppSettings {
            auto_advance: false,
            ..AppSettings::default()
        }
    }

    fn running(settings: &AppSettings) -> TimerEngine {
        let mut engine = TimerEngine::new(settings);
        engine.start(None, settings, T0).unwrap();
        engine
    }

    #[test]
    fn start_pause_resume() {
        let settings = manual_settings();
        let mut engine = TimerEngine::new(&settings);
        assert_eq!(engine.status(), TimerStatus::Idle);

        engine.start(None, &settings, T0).unwrap();
        assert_eq!(engine.status(), TimerStatus::Running);
        assert_eq!(engine.state().started_at, Some(T0));

        engine.pause(&settings, T0 + 60).unwrap();
        assert_eq!(engine.status(), TimerStatus::Paused);
        assert_eq!(engine.state().started_at, None);
        assert_eq!(engine.state().remaining_seconds, 1440);

        engine.resume(None, &settings, T0 + 120).unwrap();
        assert_eq!(engine.status(), TimerStatus::Running);
        assert_eq!(engine.state().started_at, Some(T0 + 120));
    }

    #[test]
    fn pause_while_paused_is_rejected_without_mutation() {
        let settings = manual_settings();
        let mut engine = running(&settings);
        engine.pause(&settings, T0 + 10).unwrap();
        let before = engine.clone();

        let err = engine.pause(&settings, T0 + 20).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                action: "pause",
                status: TimerStatus::Paused
            }
        ));
        assert_eq!(engine, before);
    }

    #[test]
    fn resume_and_skip_require_an_interval() {
        let settings = manual_settings();
        let mut engine = TimerEngine::new(&settings);
        assert!(engine.resume(None, &settings, T0).is_err());
        assert!(engine.skip(&settings, T0).is_err());
        assert!(engine.pause(&settings, T0).is_err());
        assert_eq!(engine, TimerEngine::new(&settings));
    }

    #[test]
    fn snapshot_recomputes_without_mutating() {
        let settings = manual_settings();
        let engine = running(&settings);
        assert_eq!(engine.snapshot(T0 + 100).remaining_seconds, 1400);
        assert_eq!(engine.snapshot(T0 + 5_000).remaining_seconds, 0);
        assert_eq!(engine.state().remaining_seconds, 1500);
    }

    #[test]
    fn skip_records_elapsed_time() {
        let settings = manual_settings();
        let mut engine = running(&settings);
        let transition = engine.skip(&settings, T0 + 300).unwrap();

        assert_eq!(transition.closed.len(), 1);
        let record = &transition.closed[0];
        assert_eq!(record.phase, TimerPhase::Focus);
        assert_eq!(record.duration_sec, 300);
        assert_eq!(record.started_at, T0);
        assert_eq!(record.ended_at, T0 + 300);
        assert!(!record.completed);

        assert_eq!(engine.status(), TimerStatus::Idle);
        assert_eq!(engine.state().phase, TimerPhase::ShortBreak);
        assert_eq!(engine.state().cycle_index, 1);
        assert_eq!(engine.state().remaining_seconds, 300);
    }

    #[test]
    fn ten_minutes_paused_five_then_skip() {
        let settings = manual_settings();
        let mut engine = running(&settings);

        engine.pause(&settings, T0 + 600).unwrap();
        assert_eq!(engine.state().remaining_seconds, 900);
        engine.resume(None, &settings, T0 + 900).unwrap();
        let transition = engine.skip(&settings, T0 + 900).unwrap();

        let record = &transition.closed[0];
        assert_eq!(record.duration_sec, 600);
        assert_eq!(record.interruptions, 1);
    }

    #[test]
    fn natural_completion_uses_expiry_instant() {
        let settings = manual_settings();
        let mut engine = running(&settings);

        let transition = engine.settle(&settings, T0 + 1_800);
        assert_eq!(transition.closed.len(), 1);
        let record = &transition.closed[0];
        assert!(record.completed);
        assert_eq!(record.duration_sec, 1500);
        assert_eq!(record.ended_at, T0 + 1500);
        assert!(transition.events.iter().any(|e| matches!(
            e,
            Event::PhaseCompleted {
                skipped: false,
                next_phase: TimerPhase::ShortBreak,
                ..
            }
        )));

        assert_eq!(engine.status(), TimerStatus::Idle);
        assert!(engine.settle(&settings, T0 + 1_900).closed.is_empty());
    }

    #[test]
    fn natural_completion_auto_advances_from_detection_time() {
        let settings = AppSettings::default();
        let mut engine = running(&settings);

        let transition = engine.settle(&settings, T0 + 2_000);
        assert_eq!(transition.closed.len(), 1);
        assert_eq!(engine.status(), TimerStatus::Running);
        assert_eq!(engine.state().phase, TimerPhase::ShortBreak);
        assert_eq!(engine.state().started_at, Some(T0 + 2_000));
        assert_eq!(engine.live_remaining(T0 + 2_000), 300);
    }

    #[test]
    fn skip_after_expiry_records_one_interval() {
        let settings = AppSettings::default();
        let mut engine = running(&settings);

        let transition = engine.skip(&settings, T0 + 1_600).unwrap();
        assert_eq!(transition.closed.len(), 1);
        assert!(transition.closed[0].completed);
        assert_eq!(transition.closed[0].phase, TimerPhase::Focus);
        assert_eq!(engine.status(), TimerStatus::Running);
        assert_eq!(engine.state().phase, TimerPhase::ShortBreak);
        assert_eq!(engine.state().started_at, Some(T0 + 1_600));

        let mut manual = running(&manual_settings());
        let transition = manual.skip(&manual_settings(), T0 + 1_600).unwrap();
        assert_eq!(transition.closed.len(), 1);
        assert_eq!(manual.status(), TimerStatus::Idle);
    }

    #[test]
    fn pause_after_expiry_closes_first() {
        let settings = manual_settings();
        let mut engine = running(&settings);
        let err = engine.pause(&settings, T0 + 1_500).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn resume_with_nothing_left_is_an_implicit_completion() {
        let settings = manual_settings();
        let mut state = TimerState::initial(&settings);
        state.set_status(TimerStatus::Paused);
        state.remaining_seconds = 0;
        state.interval_started_at = Some(T0);
        let mut engine = TimerEngine::from_state(state, &settings);

        let transition = engine.resume(None, &settings, T0 + 2_000).unwrap();
        assert_eq!(transition.closed.len(), 1);
        assert!(transition.closed[0].completed);
        assert_eq!(transition.closed[0].duration_sec, 1500);
        assert_eq!(engine.state().phase, TimerPhase::ShortBreak);
        assert_eq!(engine.status(), TimerStatus::Idle);
    }

    #[test]
    fn start_while_running_only_rebinds() {
        let settings = manual_settings();
        let mut engine = running(&settings);
        let request = StartRequest::from(ContextRequest::bind(Some(7), Some(2)));

        let transition = engine.start(Some(request), &settings, T0 + 200).unwrap();
        assert!(transition.closed.is_empty());
        assert_eq!(engine.state().started_at, Some(T0));
        assert_eq!(engine.state().project_id, Some(7));
        assert_eq!(engine.live_remaining(T0 + 200), 1300);
    }

    #[test]
    fn start_with_phase_override() {
        let settings = manual_settings();
        let mut engine = TimerEngine::new(&settings);
        let request = StartRequest {
            phase: Some(TimerPhase::LongBreak),
            ..StartRequest::default()
        };
        engine.start(Some(request), &settings, T0).unwrap();
        assert_eq!(engine.state().phase, TimerPhase::LongBreak);
        assert_eq!(engine.state().phase_total_seconds, 900);
    }

    #[test]
    fn set_context_keeps_elapsed_time() {
        let settings = manual_settings();
        let mut engine = running(&settings);
        engine.pause(&settings, T0 + 100).unwrap();

        let transition =
            engine.set_context(&ContextRequest::bind(Some(4), None), &settings, T0 + 150);
        assert_eq!(transition.events.len(), 1);
        assert_eq!(engine.state().remaining_seconds, 1400);
        assert_eq!(engine.status(), TimerStatus::Paused);

        let transition = engine.skip(&settings, T0 + 200).unwrap();
        assert_eq!(transition.closed[0].project_id, Some(4));
    }

    #[test]
    fn reset_flushes_in_progress_interval() {
        let settings = manual_settings();
        let mut engine = running(&settings);
        engine.set_context(&ContextRequest::bind(Some(1), None), &settings, T0);

        let transition = engine.reset(&settings, T0 + 420);
        assert_eq!(transition.closed.len(), 1);
        assert_eq!(transition.closed[0].duration_sec, 420);
        assert_eq!(engine.status(), TimerStatus::Idle);
        assert_eq!(engine.state().cycle_index, 0);
        assert_eq!(engine.state().project_id, Some(1));

        assert!(engine.reset(&settings, T0 + 500).closed.is_empty());
    }

    #[test]
    fn sync_settings_only_touches_idle_timer() {
        let mut settings = manual_settings();
        let mut engine = TimerEngine::new(&settings);
        settings.focus_min = 50;
        engine.sync_settings(&settings);
        assert_eq!(engine.state().remaining_seconds, 3000);

        engine.start(None, &settings, T0).unwrap();
        settings.focus_min = 10;
        engine.sync_settings(&settings);
        assert_eq!(engine.state().phase_total_seconds, 3000);
    }

    #[test]
    fn skip_cycle_rolls_into_long_break() {
        let settings = AppSettings::default();
        let mut engine = running(&settings);
        let mut visited = vec![(engine.state().phase, engine.state().cycle_index)];

        for step in 1..=7 {
            engine.skip(&settings, T0 + step).unwrap();
            visited.push((engine.state().phase, engine.state().cycle_index));
        }

        use TimerPhase::{Focus, LongBreak, ShortBreak};
        assert_eq!(
            visited,
            vec![
                (Focus, 0),
                (ShortBreak, 1),
                (Focus, 1),
                (ShortBreak, 2),
                (Focus, 2),
                (ShortBreak, 3),
                (Focus, 3),
                (LongBreak, 0),
            ]
        );
    }

    proptest! {
        #[test]
        fn pause_resume_without_elapsed_time(run in 0i64..1_499) {
            let settings = manual_settings();
            let mut engine = running(&settings);
            engine.pause(&settings, T0 + run).unwrap();
            let remaining = engine.state().remaining_seconds;

            engine.resume(None, &settings, T0 + run).unwrap();
            prop_assert_eq!(engine.live_remaining(T0 + run), remaining);
            prop_assert_eq!(engine.state().interruptions, 1);
        }

        #[test]
        fn skip_duration_is_never_negative(elapsed in 0i64..5_000, paused in any::<bool>()) {
            let settings = manual_settings();
            let mut engine = running(&settings);
            if paused {
                engine.pause(&settings, T0 + elapsed.min(1_499)).unwrap();
            }
            if let Ok(transition) = engine.skip(&settings, T0 + elapsed) {
                let record = &transition.closed[transition.closed.len() - 1];
                prop_assert!(record.duration_sec >= 0);
                prop_assert!(record.duration_sec <= 1500);
                prop_assert_eq!(transition.closed.len(), 1);
            }
        }
    }
}
