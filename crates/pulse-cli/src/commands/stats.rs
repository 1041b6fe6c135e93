use clap::Subcommand;
use pulse_core::PulseApp;

use super::{print_json, RangeArgs};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Totals, average and streak over a date range
    Summary {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// One point per day over a date range
    Timeseries {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Recorded sessions over a date range
    History {
        #[command(flatten)]
        range: RangeArgs,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = PulseApp::open()?;

    match action {
        StatsAction::Summary { range } => {
            print_json(&app.analytics_get_summary(&range.into_range()?)?)
        }
        StatsAction::Timeseries { range } => {
            print_json(&app.analytics_get_timeseries(&range.into_range()?)?)
        }
        StatsAction::History { range } => print_json(&app.session_history(&range.into_range()?)?),
    }
}
