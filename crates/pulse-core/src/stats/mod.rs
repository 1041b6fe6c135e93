//! Statistics module for pulse
//!
//! This module derives analytics from the session log: range summaries with focus
//! streaks, and zero-filled daily time series. Nothing here is stored; every
//! figure is computed fresh per query.

mod analyzer;
mod range;
mod summary;
mod timeseries;

pub use analyzer::SessionAnalyzer;
pub use range::{end_of_day, local_day, start_of_day, RangeQuery};
pub use summary::{streak_days, AnalyticsSummary};
pub use timeseries::TimeseriesPoint;
