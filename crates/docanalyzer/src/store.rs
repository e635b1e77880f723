//! Durable job store backed by rusqlite.

use chrono::{DateTime, Utc};

use crate::db::job_repo::{self, JobRow};
use crate::db::{Database, DatabaseError};
use crate::error::StoreError;
use crate::job::{Job, JobStatus};

// ─── Helpers ────────────────────────────────────────────────────────────────

fn parse_timestamp(s: &str, job_id: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::InvalidRow {
            id: job_id.to_string(),
            reason: format!("bad timestamp '{}': {}", s, e),
        })
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn job_from_row(row: JobRow) -> Result<Job, DatabaseError> {
    let status: JobStatus = row
        .status
        .parse()
        .map_err(|reason| DatabaseError::InvalidRow {
            id: row.id.clone(),
            reason,
        })?;

    let created_at = parse_timestamp(&row.created_at, &row.id)?;
    let updated_at = parse_timestamp(&row.updated_at, &row.id)?;
    let completed_at = row
        .completed_at
        .as_deref()
        .map(|s| parse_timestamp(s, &row.id))
        .transpose()?;

    // A non-terminal job never exposes a result, whatever the row holds.
    let result = if status.is_terminal() { row.result } else { None };

    Ok(Job {
        id: row.id,
        filename: row.filename,
        query: row.query,
        status,
        result,
        mime_type: row.mime_type,
        created_at,
        updated_at,
        completed_at,
    })
}

// ─── JobStore ───────────────────────────────────────────────────────────────

/// Single source of truth for job identity, status and result.
///
/// Every mutation is one autocommit statement, durable before the call
/// returns. Ordering of transitions is the caller's responsibility.
#[derive(Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts a new pending job.
    pub fn create(&self, id: &str, filename: &str, query: &str) -> Result<Job, StoreError> {
        let job = Job::with_id(id, filename, query);
        self.insert(&job)?;
        Ok(job)
    }

    /// Inserts a fully built job record.
    pub fn insert(&self, job: &Job) -> Result<(), StoreError> {
        let row = JobRow {
            id: job.id.clone(),
            filename: job.filename.clone(),
            query: job.query.clone(),
            status: job.status.as_str().to_string(),
            result: job.result.clone(),
            mime_type: job.mime_type.clone(),
            created_at: format_timestamp(job.created_at),
            updated_at: format_timestamp(job.updated_at),
            completed_at: job.completed_at.map(format_timestamp),
        };

        if !job_repo::insert(&self.db, &row)? {
            return Err(StoreError::DuplicateId(job.id.clone()));
        }
        log::debug!("Created job {} ({})", job.id, job.status);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Job, StoreError> {
        self.find(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub fn find(&self, id: &str) -> Result<Option<Job>, StoreError> {
        match job_repo::find_by_id(&self.db, id)? {
            Some(row) => Ok(Some(job_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Overwrites the status and, if provided, the result of a job.
    pub fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        result: Option<&str>,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let completed_at = status.is_terminal().then(|| format_timestamp(now));

        let updated = job_repo::update_status(
            &self.db,
            id,
            status.as_str(),
            result,
            &format_timestamp(now),
            completed_at.as_deref(),
        )?;

        if !updated {
            return Err(StoreError::NotFound(id.to_string()));
        }
        log::debug!("Job {} -> {}", id, status);
        Ok(())
    }

    /// Removes a job record. Used to roll back a submission.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        if job_repo::delete(&self.db, id)? {
            Ok(())
        } else {
            Err(StoreError::NotFound(id.to_string()))
        }
    }

    pub fn count_by_status(&self, status: JobStatus) -> Result<u64, StoreError> {
        Ok(job_repo::count_by_status(&self.db, status.as_str())?)
    }
}
