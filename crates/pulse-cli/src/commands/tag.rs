//! Tag management commands for CLI.

use clap::Subcommand;
use pulse_core::{PulseApp, TagInput};

use super::print_json;

#[derive(Subcommand)]
pub enum TagAction {
    /// List all tags
    List,
    /// Create a tag, or rename it when --id is given
    Upsert {
        /// Tag name
        name: String,
        /// Existing tag id to rename
        #[arg(long)]
        id: Option<i64>,
    },
    /// Delete a tag; its sessions are kept
    Delete {
        /// Tag id
        id: i64,
    },
}

pub fn run(action: TagAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = PulseApp::open()?;

    match action {
        TagAction::List => print_json(&app.tags_list()?),
        TagAction::Upsert { name, id } => print_json(&app.tags_upsert(&TagInput { id, name })?),
        TagAction::Delete { id } => {
            app.tags_delete(id)?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
    }
}
