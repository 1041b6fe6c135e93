//! Project management commands for CLI.

use clap::Subcommand;
use pulse_core::{ProjectInput, PulseApp};

use super::print_json;

#[derive(Subcommand)]
pub enum ProjectAction {
    /// List all projects
    List,
    /// Create a project, or update it when --id is given
    Upsert {
        /// Project name
        name: String,
        /// Existing project id to update
        #[arg(long)]
        id: Option<i64>,
        /// Display color (e.g. "#3366ff")
        #[arg(long)]
        color: Option<String>,
        /// Hide the project from pickers
        #[arg(long)]
        archived: bool,
    },
    /// Delete a project; its sessions are kept
    Delete {
        /// Project id
        id: i64,
    },
}

pub fn run(action: ProjectAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = PulseApp::open()?;

    match action {
        ProjectAction::List => print_json(&app.projects_list()?),
        ProjectAction::Upsert {
            name,
            id,
            color,
            archived,
        } => {
            let project = app.projects_upsert(&ProjectInput {
                id,
                name,
                color,
                archived: Some(archived),
            })?;
            print_json(&project)
        }
        ProjectAction::Delete { id } => {
            app.projects_delete(id)?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
    }
}
