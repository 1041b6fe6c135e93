//! Aggregation of stored sessions into summaries and daily series.
//!
//! Sessions are bucketed by the calendar day their `ended_at` falls on in the
//! analyzer's time zone, using the offset in force at that instant. Only closed
//! sessions ever reach the analyzer, so an in-progress interval never contributes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Local, NaiveDate, TimeZone, Utc};

use super::range::{local_day, RangeQuery};
use super::summary::{streak_days, AnalyticsSummary};
use super::timeseries::TimeseriesPoint;
use crate::storage::SessionRecord;

/// Derives analytics from session records.
#[derive(Debug, Clone, Copy)]
pub struct SessionAnalyzer<Tz = Local> {
    tz: Tz,
}

impl Default for SessionAnalyzer<Local> {
    fn default() -> Self {
        Self::new(Local)
    }
}

impl SessionAnalyzer<Utc> {
    /// An analyzer bucketing by UTC days.
    pub fn utc() -> Self {
        Self::new(Utc)
    }
}

impl<Tz: TimeZone> SessionAnalyzer<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> &Tz {
        &self.tz
    }

    /// The calendar day containing `now`.
    pub fn today(&self, now: i64) -> NaiveDate {
        local_day(now, &self.tz).unwrap_or_default()
    }

    /// Day the streak is counted back from: the range end, or today when the range
    /// reaches into the future.
    pub fn streak_anchor(&self, range: &RangeQuery, now: i64) -> NaiveDate {
        range.end.min(self.today(now))
    }

    /// Days with at least one Focus session of positive duration.
    pub fn focus_days(&self, sessions: &[SessionRecord]) -> BTreeSet<NaiveDate> {
        sessions
            .iter()
            .filter(|s| s.phase.is_focus() && s.duration_sec > 0)
            .filter_map(|s| local_day(s.ended_at, &self.tz))
            .collect()
    }

    /// Summarize `sessions` (already limited to `range`).
    ///
    /// `history` must hold every Focus session up to the streak anchor, including
    /// those before the range start, since a streak may reach past it.
    pub fn summary(
        &self,
        range: &RangeQuery,
        sessions: &[SessionRecord],
        history: &[SessionRecord],
        now: i64,
    ) -> AnalyticsSummary {
        let mut summary = AnalyticsSummary::default();
        for session in sessions {
            if session.phase.is_focus() {
                summary.total_focus_sec += session.duration_sec;
                summary.completed_pomodoros += 1;
            }
            summary.interruptions = summary.interruptions.saturating_add(session.interruptions);
        }

        summary.avg_daily_focus_sec = summary.total_focus_sec / range.day_count().max(1);
        summary.streak_days = streak_days(&self.focus_days(history), self.streak_anchor(range, now));
        summary
    }

    /// One point per day of `range`, zero-filled where nothing happened.
    pub fn timeseries(&self, range: &RangeQuery, sessions: &[SessionRecord]) -> Vec<TimeseriesPoint> {
        let mut points: Vec<TimeseriesPoint> = range
            .days()
            .map(|day| TimeseriesPoint::empty(day.format("%Y-%m-%d").to_string()))
            .collect();
        let index: BTreeMap<NaiveDate, usize> =
            range.days().enumerate().map(|(i, day)| (day, i)).collect();

        for session in sessions {
            let Some(&i) = local_day(session.ended_at, &self.tz).and_then(|day| index.get(&day))
            else {
                continue;
            };
            let point = &mut points[i];
            if session.phase.is_focus() {
                point.focus_seconds += session.duration_sec;
                point.completed_pomodoros += 1;
            }
            point.interruptions = point.interruptions.saturating_add(session.interruptions);
        }
        points
    }
}
