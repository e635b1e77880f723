//! Submission and status operations shared by every front end.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::analysis::effective_query;
use crate::error::{StoreError, SubmitError};
use crate::job::{new_job_id, Job, JobStatus, JobStatusView};
use crate::queue::{DispatchMessage, DispatchQueue};
use crate::stage::{artifact_extension, ArtifactStage};
use crate::store::JobStore;

/// Per-status job counts for the info endpoint.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct JobCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Clone)]
pub struct AnalysisService {
    store: JobStore,
    stage: Arc<ArtifactStage>,
    queue: Arc<dyn DispatchQueue>,
    accepted_extensions: Vec<String>,
}

impl AnalysisService {
    pub fn new(
        store: JobStore,
        stage: Arc<ArtifactStage>,
        queue: Arc<dyn DispatchQueue>,
        accepted_extensions: Vec<String>,
    ) -> Self {
        Self {
            store,
            stage,
            queue,
            accepted_extensions: accepted_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn accepted_extensions(&self) -> &[String] {
        &self.accepted_extensions
    }

    pub fn queue_name(&self) -> &'static str {
        self.queue.name()
    }

    /// Case-insensitive check of the filename's extension.
    pub fn accepts(&self, filename: &str) -> bool {
        Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| self.accepted_extensions.contains(&e))
    }

    fn check_filename(&self, filename: &str) -> Result<(), SubmitError> {
        if self.accepts(filename) {
            Ok(())
        } else {
            Err(SubmitError::UnsupportedMediaType {
                filename: filename.to_string(),
                accepted: self.accepted_extensions.join(", "),
            })
        }
    }

    /// Submits an in-memory upload.
    pub fn submit(
        &self,
        file_bytes: &[u8],
        filename: &str,
        query: Option<&str>,
    ) -> Result<Job, SubmitError> {
        if file_bytes.is_empty() {
            self.check_filename(filename)?;
            return Err(SubmitError::EmptyFile(filename.to_string()));
        }
        self.submit_reader(file_bytes, filename, query)
    }

    /// Stages the upload, records the job, then dispatches it.
    ///
    /// Everything done before a failing step is undone before the error
    /// is returned, so a failed submission leaves no record, artifact or
    /// message behind.
    pub fn submit_reader<R: Read>(
        &self,
        reader: R,
        filename: &str,
        query: Option<&str>,
    ) -> Result<Job, SubmitError> {
        self.check_filename(filename)?;

        let id = new_job_id();
        let query = effective_query(query);
        let extension = artifact_extension(filename);

        let artifact = self.stage.stage(&id, &extension, reader)?;
        if std::fs::metadata(&artifact).map(|m| m.len()).unwrap_or(0) == 0 {
            self.rollback(&id, false);
            return Err(SubmitError::EmptyFile(filename.to_string()));
        }

        let job = match self.store.create(&id, filename, &query) {
            Ok(job) => job,
            Err(e) => {
                self.rollback(&id, false);
                return Err(e.into());
            }
        };

        let message = DispatchMessage::new(&id, artifact, &query);
        if let Err(e) = self.queue.enqueue(&message) {
            log::error!("Failed to dispatch job {}: {}", id, e);
            self.rollback(&id, true);
            return Err(e.into());
        }

        log::info!("Submitted job {} ({})", id, filename);
        Ok(job)
    }

    fn rollback(&self, id: &str, record_created: bool) {
        if record_created {
            if let Err(e) = self.store.delete(id) {
                log::warn!("Rollback of job record {} failed: {}", id, e);
            }
        }
        if let Err(e) = self.stage.discard(id) {
            log::warn!("Rollback of artifact {} failed: {}", id, e);
        }
    }

    /// Client-facing status. The result is present only in terminal states.
    pub fn status(&self, job_id: &str) -> Result<JobStatusView, StoreError> {
        Ok(self.store.get(job_id)?.view())
    }

    pub fn job_counts(&self) -> Result<JobCounts, StoreError> {
        Ok(JobCounts {
            pending: self.store.count_by_status(JobStatus::Pending)?,
            processing: self.store.count_by_status(JobStatus::Processing)?,
            completed: self.store.count_by_status(JobStatus::Completed)?,
            failed: self.store.count_by_status(JobStatus::Failed)?,
        })
    }
}
