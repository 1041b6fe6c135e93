//! CSV and JSON renderings of a range of sessions.
//!
//! Output depends only on its inputs: the same range over the same data always
//! produces byte-identical content.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stats::RangeQuery;
use crate::storage::{Project, SessionRecord, Tag};

pub const CSV_HEADER: &str =
    "id,phase,startedAt,endedAt,durationSec,completed,interruptions,projectId,tagId";

/// Rendered export, ready to be written to `filename`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    pub filename: String,
    pub content: String,
}

/// Shape of a JSON export (backup) document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub range: RangeQuery,
    pub projects: Vec<Project>,
    pub tags: Vec<Tag>,
    pub sessions: Vec<SessionRecord>,
}

impl ExportBundle {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

fn optional_id(id: Option<i64>) -> String {
    id.map(|v| v.to_string()).unwrap_or_default()
}

/// One CSV row per session, epoch-second timestamps, empty cells for missing ids.
pub fn render_csv(range: &RangeQuery, sessions: &[SessionRecord]) -> ExportResult {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');

    for s in sessions {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{}\n",
            s.id,
            s.phase.as_db_value(),
            s.started_at,
            s.ended_at,
            s.duration_sec,
            s.completed,
            s.interruptions,
            optional_id(s.project_id),
            optional_id(s.tag_id),
        ));
    }

    ExportResult {
        filename: format!("pulse-sessions-{}.csv", range.label()),
        content: csv,
    }
}

/// Pretty-printed [`ExportBundle`].
pub fn render_json(
    range: &RangeQuery,
    projects: Vec<Project>,
    tags: Vec<Tag>,
    sessions: Vec<SessionRecord>,
) -> Result<ExportResult> {
    let bundle = ExportBundle {
        range: *range,
        projects,
        tags,
        sessions,
    };
    Ok(ExportResult {
        filename: format!("pulse-backup-{}.json", range.label()),
        content: serde_json::to_string_pretty(&bundle)?,
    })
}
