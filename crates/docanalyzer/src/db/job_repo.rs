//! Job repository - CRUD operations for the `jobs` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub filename: String,
    pub query: String,
    pub status: String,
    pub result: Option<String>,
    pub mime_type: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            filename: row.get("filename")?,
            query: row.get("query")?,
            status: row.get("status")?,
            result: row.get("result")?,
            mime_type: row.get("mime_type")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Inserts a new job row.
///
/// Returns `false` without touching the table when a row with the same id
/// already exists.
pub fn insert(db: &Database, job: &JobRow) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let inserted = conn.execute(
            "INSERT INTO jobs (id, filename, query, status, result, mime_type,
             created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO NOTHING",
            params![
                job.id,
                job.filename,
                job.query,
                job.status,
                job.result,
                job.mime_type,
                job.created_at,
                job.updated_at,
                job.completed_at,
            ],
        )?;
        Ok(inserted == 1)
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM jobs WHERE id = ?1",
                params![id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Overwrites status (and result, when given) of a job.
///
/// `completed_at` is stamped when provided and left untouched otherwise.
/// Returns `false` when no row matched.
pub fn update_status(
    db: &Database,
    id: &str,
    status: &str,
    result: Option<&str>,
    updated_at: &str,
    completed_at: Option<&str>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE jobs SET status = ?2,
                 result = COALESCE(?3, result),
                 updated_at = ?4,
                 completed_at = COALESCE(?5, completed_at)
             WHERE id = ?1",
            params![id, status, result, updated_at, completed_at],
        )?;
        Ok(updated == 1)
    })
}

/// Deletes a job row. Returns `false` when no row matched.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        Ok(deleted == 1)
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
