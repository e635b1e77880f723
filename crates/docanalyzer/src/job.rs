//! Job model and lifecycle status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an analysis job.
///
/// Transitions are monotonic: `Pending -> Processing -> {Completed | Failed}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Returns true for `Completed` and `Failed`; no transition leaves these.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` respects the lifecycle order.
    ///
    /// `Processing -> Processing` is allowed so a redelivered job whose
    /// previous worker died can be resumed.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// A document analysis job as seen by the rest of the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    /// Client-supplied name, advisory only.
    pub filename: String,
    pub query: String,
    pub status: JobStatus,
    /// Output text when completed, error description when failed.
    pub result: Option<String>,
    pub mime_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a new pending job with a fresh UUID.
    pub fn new(filename: impl Into<String>, query: impl Into<String>) -> Self {
        Self::with_id(new_job_id(), filename, query)
    }

    pub fn with_id(
        id: impl Into<String>,
        filename: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        let filename = filename.into();
        let now = Utc::now();
        Self {
            id: id.into(),
            mime_type: mime_guess::from_path(&filename)
                .first()
                .map(|m| m.to_string()),
            filename,
            query: query.into(),
            status: JobStatus::Pending,
            result: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Client-facing view; the result is only exposed in terminal states.
    pub fn view(&self) -> JobStatusView {
        JobStatusView {
            job_id: self.id.clone(),
            filename: self.filename.clone(),
            status: self.status,
            submitted_at: self.created_at,
            result: if self.status.is_terminal() {
                self.result.clone()
            } else {
                None
            },
        }
    }
}

/// Generates a new opaque job identifier.
pub fn new_job_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Status-poll response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobStatusView {
    pub job_id: String,
    pub filename: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}
