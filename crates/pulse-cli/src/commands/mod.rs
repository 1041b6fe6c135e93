pub mod completions;
pub mod config;
pub mod export;
pub mod project;
pub mod reset;
pub mod stats;
pub mod tag;
pub mod timer;

use chrono::{Days, Local, NaiveDate};
use clap::Args;
use pulse_core::{RangeQuery, ValidationError};
use serde::Serialize;

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Inclusive calendar-date range, defaulting to the last seven days.
#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    /// First day (YYYY-MM-DD), default six days before --end
    #[arg(long)]
    pub start: Option<NaiveDate>,
    /// Last day (YYYY-MM-DD), default today
    #[arg(long)]
    pub end: Option<NaiveDate>,
    /// Only sessions bound to this project id
    #[arg(long)]
    pub project: Option<i64>,
    /// Only sessions bound to this tag id
    #[arg(long)]
    pub tag: Option<i64>,
}

impl RangeArgs {
    pub fn into_range(self) -> Result<RangeQuery, ValidationError> {
        let end = self.end.unwrap_or_else(|| Local::now().date_naive());
        let start = self
            .start
            .or_else(|| end.checked_sub_days(Days::new(6)))
            .unwrap_or(end);
        Ok(RangeQuery::new(start, end)?
            .with_project(self.project)
            .with_tag(self.tag))
    }
}
