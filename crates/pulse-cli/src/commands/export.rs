use std::path::PathBuf;

use clap::Subcommand;
use pulse_core::{ExportResult, PulseApp};

use super::{print_json, RangeArgs};

#[derive(Subcommand)]
pub enum ExportAction {
    /// One row per session
    Csv {
        #[command(flatten)]
        range: RangeArgs,
        /// Write to this file (or into this directory) instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Sessions plus projects and tags, as a backup document
    Json {
        #[command(flatten)]
        range: RangeArgs,
        /// Write to this file (or into this directory) instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

pub fn run(action: ExportAction) -> Result<(), Box<dyn std::error::Error>> {
    let app = PulseApp::open()?;

    let (export, out) = match action {
        ExportAction::Csv { range, out } => (app.export_csv(&range.into_range()?)?, out),
        ExportAction::Json { range, out } => (app.export_json(&range.into_range()?)?, out),
    };

    match out {
        Some(out) => {
            let path = write_export(&export, out)?;
            print_json(&serde_json::json!({
                "filename": export.filename,
                "path": path.display().to_string(),
            }))
        }
        None => {
            print!("{}", export.content);
            Ok(())
        }
    }
}

fn write_export(export: &ExportResult, out: PathBuf) -> std::io::Result<PathBuf> {
    let path = if out.is_dir() {
        out.join(&export.filename)
    } else {
        out
    };
    std::fs::write(&path, &export.content)?;
    Ok(path)
}
