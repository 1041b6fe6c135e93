//! Append-only session log.
//!
//! A session is written once, when its interval closes, and never updated. The only
//! way rows leave the table is [`Database::clear_sessions`] (or `reset_all`).

use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use super::database::Database;
use crate::error::{DatabaseError, Result};
use crate::timer::TimerPhase;

/// A closed interval. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: i64,
    pub phase: TimerPhase,
    pub started_at: i64,
    pub ended_at: i64,
    pub duration_sec: i64,
    /// True when the interval ran to its configured length.
    pub completed: bool,
    pub interruptions: u32,
    pub project_id: Option<i64>,
    pub tag_id: Option<i64>,
}

/// A closed interval waiting for its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub phase: TimerPhase,
    pub started_at: i64,
    pub ended_at: i64,
    pub duration_sec: i64,
    pub completed: bool,
    pub interruptions: u32,
    pub project_id: Option<i64>,
    pub tag_id: Option<i64>,
}

impl NewSession {
    pub fn into_record(self, id: i64) -> SessionRecord {
        SessionRecord {
            id,
            phase: self.phase,
            started_at: self.started_at,
            ended_at: self.ended_at,
            duration_sec: self.duration_sec,
            completed: self.completed,
            interruptions: self.interruptions,
            project_id: self.project_id,
            tag_id: self.tag_id,
        }
    }
}

/// Filter for [`Database::query_sessions`]. Bounds are epoch seconds on `ended_at`,
/// `from` inclusive and `until` exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionQuery {
    pub from: Option<i64>,
    pub until: Option<i64>,
    pub project_id: Option<i64>,
    pub tag_id: Option<i64>,
}

impl SessionQuery {
    fn to_sql(self) -> (String, Vec<Value>) {
        let mut query = String::from(
            "SELECT id, phase, started_at, ended_at, duration_sec, completed, interruptions,
                    project_id, tag_id
             FROM sessions WHERE 1 = 1",
        );
        let mut values = Vec::new();

        if let Some(from) = self.from {
            query.push_str(" AND ended_at >= ?");
            values.push(Value::Integer(from));
        }
        if let Some(until) = self.until {
            query.push_str(" AND ended_at < ?");
            values.push(Value::Integer(until));
        }
        if let Some(project_id) = self.project_id {
            query.push_str(" AND project_id = ?");
            values.push(Value::Integer(project_id));
        }
        if let Some(tag_id) = self.tag_id {
            query.push_str(" AND tag_id = ?");
            values.push(Value::Integer(tag_id));
        }

        query.push_str(" ORDER BY ended_at ASC, id ASC");
        (query, values)
    }
}

pub(crate) fn insert_session(conn: &Connection, session: &NewSession) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO sessions (phase, started_at, ended_at, duration_sec, completed,
                               interruptions, project_id, tag_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            session.phase.as_db_value(),
            session.started_at,
            session.ended_at,
            session.duration_sec,
            session.completed,
            session.interruptions,
            session.project_id,
            session.tag_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

type RawSession = (i64, String, i64, i64, i64, bool, u32, Option<i64>, Option<i64>);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawSession> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

/// Sessions matching `query` on an already locked connection.
pub(crate) fn select_sessions(
    conn: &Connection,
    query: &SessionQuery,
) -> Result<Vec<SessionRecord>> {
    let (sql, values) = query.to_sql();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(values), read_row)?;
    let mut sessions = Vec::new();
    for row in rows {
        let (
            id,
            phase_raw,
            started_at,
            ended_at,
            duration_sec,
            completed,
            interruptions,
            project_id,
            tag_id,
        ) = row?;
        let phase =
            TimerPhase::from_db_value(&phase_raw).ok_or_else(|| DatabaseError::Corrupt {
                table: "sessions",
                message: format!("unknown timer phase '{phase_raw}' in row {id}"),
            })?;
        sessions.push(SessionRecord {
            id,
            phase,
            started_at,
            ended_at,
            duration_sec,
            completed,
            interruptions,
            project_id,
            tag_id,
        });
    }
    Ok(sessions)
}

pub(crate) fn delete_sessions(conn: &Connection) -> rusqlite::Result<u64> {
    Ok(conn.execute("DELETE FROM sessions", [])? as u64)
}

impl Database {
    /// Append one closed interval and return its id.
    pub fn append_session(&self, session: &NewSession) -> Result<i64> {
        let conn = self.conn()?;
        Ok(insert_session(&conn, session)?)
    }

    /// Sessions matching `query`, ordered by `ended_at` ascending.
    pub fn query_sessions(&self, query: &SessionQuery) -> Result<Vec<SessionRecord>> {
        select_sessions(&*self.conn()?, query)
    }

    pub fn count_sessions(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| {
            row.get::<_, u64>(0)
        })?;
        Ok(count)
    }

    /// Remove every session. Returns how many were deleted.
    pub fn clear_sessions(&self) -> Result<u64> {
        Ok(delete_sessions(&*self.conn()?)?)
    }
}
