//! Calendar-date ranges and how they map onto stored epoch seconds.

use chrono::{Days, NaiveDate, NaiveTime, Offset, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::storage::SessionQuery;

const SECONDS_PER_DAY: i64 = 86_400;

/// An inclusive `[start, end]` range of calendar days, optionally narrowed to one
/// project and/or tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    /// First day (inclusive)
    pub start: NaiveDate,
    /// Last day (inclusive)
    pub end: NaiveDate,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub tag_id: Option<i64>,
}

impl RangeQuery {
    /// Create an unfiltered range, rejecting `end < start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        let range = Self {
            start,
            end,
            project_id: None,
            tag_id: None,
        };
        range.validate()?;
        Ok(range)
    }

    pub fn with_project(mut self, project_id: Option<i64>) -> Self {
        self.project_id = project_id;
        self
    }

    pub fn with_tag(mut self, tag_id: Option<i64>) -> Self {
        self.tag_id = tag_id;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.end < self.start {
            return Err(ValidationError::InvalidDateRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Number of calendar days covered, always at least 1 for a valid range.
    pub fn day_count(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Every day in the range, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let count = usize::try_from(self.day_count()).unwrap_or(0);
        self.start.iter_days().take(count)
    }

    /// Epoch-second bounds `[from, until)` of the range in `tz`.
    pub fn bounds<Tz: TimeZone>(&self, tz: &Tz) -> (i64, i64) {
        (start_of_day(self.start, tz), end_of_day(self.end, tz))
    }

    /// The store query selecting sessions that ended inside the range.
    pub fn session_query<Tz: TimeZone>(&self, tz: &Tz) -> SessionQuery {
        let (from, until) = self.bounds(tz);
        SessionQuery {
            from: Some(from),
            until: Some(until),
            project_id: self.project_id,
            tag_id: self.tag_id,
        }
    }

    /// `<start>_<end>`, used in export filenames.
    pub fn label(&self) -> String {
        format!("{}_{}", self.start, self.end)
    }
}

/// Epoch seconds of the first instant of `day` in `tz`.
///
/// A repeated midnight resolves to its earlier occurrence. A midnight skipped by a
/// clock change starts the day at the transition itself.
pub fn start_of_day<Tz: TimeZone>(day: NaiveDate, tz: &Tz) -> i64 {
    let midnight = day.and_time(NaiveTime::MIN);
    if let Some(start) = tz.from_local_datetime(&midnight).earliest() {
        return start.timestamp();
    }
    let before = midnight.checked_sub_days(Days::new(1)).unwrap_or(midnight);
    let offset = tz.offset_from_utc_datetime(&before).fix();
    midnight.and_utc().timestamp() - i64::from(offset.local_minus_utc())
}

/// Epoch seconds of the first instant after `day` in `tz`.
pub fn end_of_day<Tz: TimeZone>(day: NaiveDate, tz: &Tz) -> i64 {
    match day.checked_add_days(Days::new(1)) {
        Some(next) => start_of_day(next, tz),
        None => start_of_day(day, tz) + SECONDS_PER_DAY,
    }
}

/// The calendar day `ts` falls on in `tz`.
pub fn local_day<Tz: TimeZone>(ts: i64, tz: &Tz) -> Option<NaiveDate> {
    tz.timestamp_opt(ts, 0).single().map(|dt| dt.date_naive())
}
