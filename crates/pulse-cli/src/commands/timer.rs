use clap::{Args, Subcommand};
use pulse_core::{ContextRequest, PulseApp, StartRequest, TimerPhase};

use super::print_json;

/// Project/tag binding flags shared by start, resume and context.
#[derive(Args, Debug, Clone, Default)]
pub struct ContextArgs {
    /// Bind to this project id
    #[arg(long, conflicts_with = "clear_project")]
    project: Option<i64>,
    /// Bind to this tag id
    #[arg(long, conflicts_with = "clear_tag")]
    tag: Option<i64>,
    /// Remove the project binding
    #[arg(long)]
    clear_project: bool,
    /// Remove the tag binding
    #[arg(long)]
    clear_tag: bool,
}

impl ContextArgs {
    fn into_request(self) -> ContextRequest {
        let pick = |id: Option<i64>, clear: bool| {
            if clear {
                Some(None)
            } else {
                id.map(Some)
            }
        };
        ContextRequest {
            project_id: pick(self.project, self.clear_project),
            tag_id: pick(self.tag, self.clear_tag),
        }
    }
}

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start the pre-selected interval (or rebind context while one is active)
    Start {
        /// Start this phase instead (focus, short-break, long-break)
        #[arg(long)]
        phase: Option<TimerPhase>,
        #[command(flatten)]
        context: ContextArgs,
    },
    /// Pause the running interval
    Pause,
    /// Resume a paused interval
    Resume {
        #[command(flatten)]
        context: ContextArgs,
    },
    /// End the current interval early and move to the next phase
    Skip,
    /// Return to the first focus of a fresh cycle
    Reset,
    /// Print current timer state as JSON
    Status,
    /// Change the project/tag binding without touching elapsed time
    Context {
        #[command(flatten)]
        context: ContextArgs,
    },
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = PulseApp::open()?;

    let state = match action {
        TimerAction::Start { phase, context } => {
            let request = StartRequest {
                context: context.into_request(),
                phase,
            };
            app.timer_start(Some(request))?
        }
        TimerAction::Pause => app.timer_pause()?,
        TimerAction::Resume { context } => {
            let request = context.into_request();
            app.timer_resume((!request.is_empty()).then_some(request))?
        }
        TimerAction::Skip => app.timer_skip()?,
        TimerAction::Reset => app.timer_reset()?,
        TimerAction::Status => app.timer_get_state()?,
        TimerAction::Context { context } => app.timer_set_context(context.into_request())?,
    };

    print_json(&state)
}
