//! Projects and tags: user-defined labels that sessions and the timer point at.
//!
//! References to them are soft. Deleting a project or tag leaves every session that
//! mentions its id as it was; the presentation shows such ids as "unknown".

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::database::Database;
use crate::error::{CoreError, Result, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
    pub archived: bool,
}

/// Create (no `id`) or update (with `id`) a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    pub id: Option<i64>,
    pub name: String,
    pub color: Option<String>,
    pub archived: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Create (no `id`) or update (with `id`) a tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagInput {
    pub id: Option<i64>,
    pub name: String,
}

fn validated_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "name".into(),
            message: "must not be empty".into(),
        }
        .into());
    }
    Ok(name.to_string())
}

/// Map a UNIQUE violation on `name` to a validation error.
fn name_conflict(err: rusqlite::Error, name: &str) -> CoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            ValidationError::InvalidValue {
                field: "name".into(),
                message: format!("'{name}' already exists"),
            }
            .into()
        }
        _ => err.into(),
    }
}

fn fetch_project(conn: &Connection, id: i64) -> rusqlite::Result<Option<Project>> {
    conn.query_row(
        "SELECT id, name, color, archived FROM projects WHERE id = ?1",
        params![id],
        |row| {
            Ok(Project {
                id: row.get(0)?,
                name: row.get(1)?,
                color: row.get(2)?,
                archived: row.get(3)?,
            })
        },
    )
    .optional()
}

fn fetch_tag(conn: &Connection, id: i64) -> rusqlite::Result<Option<Tag>> {
    conn.query_row(
        "SELECT id, name FROM tags WHERE id = ?1",
        params![id],
        |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    )
    .optional()
}

pub(crate) fn select_projects(conn: &Connection) -> rusqlite::Result<Vec<Project>> {
    let mut stmt = conn
        .prepare("SELECT id, name, color, archived FROM projects ORDER BY archived ASC, name ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok(Project {
            id: row.get(0)?,
            name: row.get(1)?,
            color: row.get(2)?,
            archived: row.get(3)?,
        })
    })?;
    rows.collect()
}

pub(crate) fn select_tags(conn: &Connection) -> rusqlite::Result<Vec<Tag>> {
    let mut stmt = conn.prepare("SELECT id, name FROM tags ORDER BY name ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok(Tag {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    rows.collect()
}

impl Database {
    /// Active projects first, then archived, each alphabetically.
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(select_projects(&*self.conn()?)?)
    }

    /// Insert or update a project.
    ///
    /// # Errors
    /// `NotFound` when updating an id that does not exist; `Validation` for an empty
    /// or duplicate name.
    pub fn upsert_project(&self, input: &ProjectInput, now: i64) -> Result<Project> {
        let name = validated_name(&input.name)?;
        let archived = input.archived.unwrap_or(false);
        let conn = self.conn()?;

        let id = match input.id {
            Some(id) => {
                let updated = conn
                    .execute(
                        "UPDATE projects SET name = ?1, color = ?2, archived = ?3 WHERE id = ?4",
                        params![name, input.color, archived, id],
                    )
                    .map_err(|e| name_conflict(e, &name))?;
                if updated == 0 {
                    return Err(CoreError::NotFound { kind: "project", id });
                }
                id
            }
            None => {
                conn.execute(
                    "INSERT INTO projects (name, color, archived, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![name, input.color, archived, now],
                )
                .map_err(|e| name_conflict(e, &name))?;
                conn.last_insert_rowid()
            }
        };

        fetch_project(&conn, id)?.ok_or(CoreError::NotFound { kind: "project", id })
    }

    pub fn project_exists(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        Ok(fetch_project(&conn, id)?.is_some())
    }

    /// Delete a project. Sessions keep their `project_id`.
    pub fn delete_project(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(CoreError::NotFound { kind: "project", id });
        }
        Ok(())
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        Ok(select_tags(&*self.conn()?)?)
    }

    /// Insert or update a tag.
    ///
    /// # Errors
    /// `NotFound` when updating an id that does not exist; `Validation` for an empty
    /// or duplicate name.
    pub fn upsert_tag(&self, input: &TagInput, now: i64) -> Result<Tag> {
        let name = validated_name(&input.name)?;
        let conn = self.conn()?;

        let id = match input.id {
            Some(id) => {
                let updated = conn
                    .execute("UPDATE tags SET name = ?1 WHERE id = ?2", params![name, id])
                    .map_err(|e| name_conflict(e, &name))?;
                if updated == 0 {
                    return Err(CoreError::NotFound { kind: "tag", id });
                }
                id
            }
            None => {
                conn.execute(
                    "INSERT INTO tags (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )
                .map_err(|e| name_conflict(e, &name))?;
                conn.last_insert_rowid()
            }
        };

        fetch_tag(&conn, id)?.ok_or(CoreError::NotFound { kind: "tag", id })
    }

    pub fn tag_exists(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        Ok(fetch_tag(&conn, id)?.is_some())
    }

    /// Delete a tag. Sessions keep their `tag_id`.
    pub fn delete_tag(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM tags WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(CoreError::NotFound { kind: "tag", id });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{NewSession, SessionQuery};
    use crate::timer::TimerPhase;

    fn project(name: &str) -> ProjectInput {
        ProjectInput {
            name: name.into(),
            ..ProjectInput::default()
        }
    }

    #[test]
    fn projects_create_update_list() {
        let db = Database::open_memory().unwrap();
        let writing = db.upsert_project(&project("Writing"), 10).unwrap();
        let admin = db.upsert_project(&project("Admin"), 11).unwrap();
        assert_eq!(writing.id, 1);
        assert!(!writing.archived);

        db.upsert_project(
            &ProjectInput {
                id: Some(admin.id),
                name: "Admin".into(),
                color: Some("#ff0000".into()),
                archived: Some(true),
            },
            12,
        )
        .unwrap();

        let names: Vec<String> = db.list_projects().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Writing".to_string(), "Admin".to_string()]);
    }

    #[test]
    fn updating_missing_project_is_not_found() {
        let db = Database::open_memory().unwrap();
        let input = ProjectInput {
            id: Some(42),
            ..project("Ghost")
        };
        assert!(matches!(
            db.upsert_project(&input, 0),
            Err(CoreError::NotFound { kind: "project", id: 42 })
        ));
    }

    #[test]
    fn names_must_be_present_and_unique() {
        let db = Database::open_memory().unwrap();
        assert!(matches!(
            db.upsert_tag(&TagInput { id: None, name: "  ".into() }, 0),
            Err(CoreError::Validation(_))
        ));

        db.upsert_tag(&TagInput { id: None, name: "deep".into() }, 0).unwrap();
        assert!(matches!(
            db.upsert_tag(&TagInput { id: None, name: "deep".into() }, 0),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn deleting_a_tag_keeps_session_references() {
        let db = Database::open_memory().unwrap();
        let tag = db.upsert_tag(&TagInput { id: None, name: "reading".into() }, 0).unwrap();
        db.append_session(&NewSession {
            phase: TimerPhase::Focus,
            started_at: 0,
            ended_at: 1500,
            duration_sec: 1500,
            completed: true,
            interruptions: 0,
            project_id: None,
            tag_id: Some(tag.id),
        })
        .unwrap();

        db.delete_tag(tag.id).unwrap();
        assert!(!db.tag_exists(tag.id).unwrap());
        let sessions = db.query_sessions(&SessionQuery::default()).unwrap();
        assert_eq!(sessions[0].tag_id, Some(tag.id));

        assert!(matches!(
            db.delete_tag(tag.id),
            Err(CoreError::NotFound { kind: "tag", .. })
        ));
    }
}
