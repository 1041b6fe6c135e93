//! SQLite-based persistence.
//!
//! Provides persistent storage for:
//! - Closed timer intervals (the append-only session log)
//! - Projects and tags
//! - Key-value store for application state (the current timer)
//!
//! The connection sits behind a `Mutex`, so one `Database` can be shared between the
//! timer path and concurrent readers. Every statement runs while the lock is held,
//! which means a reader sees either all of a committed interval or none of it.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::migrations;
use super::sessions::{delete_sessions, insert_session, NewSession, SessionRecord};
use crate::error::{CoreError, DatabaseError, Result};
use crate::timer::TimerState;

const TIMER_STATE_KEY: &str = "timer_state";

/// Row counts removed by [`Database::reset_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetCounts {
    pub sessions: u64,
    pub projects: u64,
    pub tags: u64,
}

/// SQLite database for sessions, projects, tags and timer state.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for tests and throwaway sessions).
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the underlying SQLite connection.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Database(DatabaseError::Locked))
    }

    /// Run `read` inside one transaction, so every select in it sees the same
    /// committed state.
    pub fn read<T>(&self, read: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let value = read(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Load the persisted timer, if any.
    ///
    /// A row that no longer decodes is logged and ignored so a schema change in the
    /// timer never blocks startup.
    pub fn load_timer_state(&self) -> Result<Option<TimerState>> {
        let Some(json) = self.kv_get(TIMER_STATE_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str::<TimerState>(&json) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                tracing::warn!(error = %e, "discarding undecodable timer state");
                Ok(None)
            }
        }
    }

    pub fn save_timer_state(&self, state: &TimerState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.kv_set(TIMER_STATE_KEY, &json)
    }

    /// Append closed intervals and store the timer that follows them, atomically.
    ///
    /// Either every record and the new timer state are durable, or nothing changed.
    pub fn commit_interval(
        &self,
        closed: &[NewSession],
        state: &TimerState,
    ) -> Result<Vec<SessionRecord>> {
        let json = serde_json::to_string(state)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut records = Vec::with_capacity(closed.len());
        for session in closed {
            let id = insert_session(&tx, session)?;
            records.push(session.clone().into_record(id));
        }
        tx.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![TIMER_STATE_KEY, json],
        )?;
        tx.commit()?;
        Ok(records)
    }

    /// Delete every session, project and tag, reset id sequences and store `state`
    /// as the new timer, all in one transaction.
    pub fn reset_all(&self, state: &TimerState) -> Result<ResetCounts> {
        let json = serde_json::to_string(state)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let count = |table: &str| -> rusqlite::Result<u64> {
            tx.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, u64>(0)
            })
        };
        let projects = count("projects")?;
        let tags = count("tags")?;

        let sessions = delete_sessions(&tx)?;
        tx.execute_batch(
            "DELETE FROM projects;
             DELETE FROM tags;
             DELETE FROM kv;
             DELETE FROM sqlite_sequence WHERE name IN ('sessions', 'projects', 'tags');",
        )?;
        tx.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)",
            params![TIMER_STATE_KEY, json],
        )?;
        tx.commit()?;
        Ok(ResetCounts {
            sessions,
            projects,
            tags,
        })
    }
}
