//! Per-message execution protocol.
//!
//! 1. Load the job; a missing or terminal job is skipped (redelivery guard).
//! 2. Move it to `processing` (a job already `processing` is resumed).
//! 3. Extract text from the staged artifact.
//! 4. Run the analyst under a deadline.
//! 5. Write `completed` or `failed` unconditionally.
//! 6. Discard the artifact on every exit path.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;

use crate::analysis::{AnalysisRequest, Analyst};
use crate::error::{AnalysisError, ProcessError, StageError, StoreError};
use crate::extract::TextExtractor;
use crate::job::{Job, JobStatus};
use crate::queue::DispatchMessage;
use crate::sanitize::redact_path;
use crate::stage::ArtifactStage;
use crate::store::JobStore;

/// What happened to one dispatched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Holds the description stored as the job result.
    Failed(String),
    /// Nothing to do; the job is unknown or already finished.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    JobMissing,
    AlreadyTerminal(JobStatus),
}

/// Reasons a job ends up `failed`.
#[derive(Debug, thiserror::Error)]
enum ExecutionFailure {
    #[error(transparent)]
    Artifact(#[from] StageError),

    #[error(transparent)]
    Extraction(#[from] ProcessError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("worker panicked: {0}")]
    Panicked(String),
}

impl ExecutionFailure {
    fn describe(&self) -> String {
        format!("Error: {}", self)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Discards the staged artifact when dropped, whatever path execution took.
struct ArtifactGuard<'a> {
    stage: &'a ArtifactStage,
    job_id: &'a str,
    artifact_ref: &'a Path,
}

impl Drop for ArtifactGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.stage.discard(self.job_id) {
            log::warn!("Failed to discard artifact for job {}: {}", self.job_id, e);
        }
        // Refs outside the staging directory are never touched.
        if self.artifact_ref.parent() == Some(self.stage.staging_dir()) {
            let _ = std::fs::remove_file(self.artifact_ref);
        }
    }
}

pub struct JobExecutor {
    store: JobStore,
    stage: Arc<ArtifactStage>,
    extractor: Arc<dyn TextExtractor>,
    analyst: Arc<dyn Analyst>,
    analysis_timeout: Duration,
}

impl JobExecutor {
    pub fn new(
        store: JobStore,
        stage: Arc<ArtifactStage>,
        extractor: Arc<dyn TextExtractor>,
        analyst: Arc<dyn Analyst>,
        analysis_timeout: Duration,
    ) -> Self {
        Self {
            store,
            stage,
            extractor,
            analyst,
            analysis_timeout,
        }
    }

    pub fn analysis_timeout(&self) -> Duration {
        self.analysis_timeout
    }

    /// Runs the protocol for one message.
    ///
    /// An `Err` means the store itself could not be reached; the message
    /// should not be acknowledged so it can be redelivered.
    pub fn execute(&self, message: &DispatchMessage) -> Result<Outcome, StoreError> {
        let job_id = message.job_id.as_str();

        let job = match self.store.find(job_id)? {
            Some(job) => job,
            None => {
                log::warn!("Dropping dispatch for unknown job {}", job_id);
                self.discard_quietly(job_id);
                return Ok(Outcome::Skipped(SkipReason::JobMissing));
            }
        };

        if !job.status.can_transition_to(JobStatus::Processing) {
            log::info!(
                "Job {} already {}; ignoring redelivered message",
                job_id,
                job.status
            );
            self.discard_quietly(job_id);
            return Ok(Outcome::Skipped(SkipReason::AlreadyTerminal(job.status)));
        }

        let span = tracing::info_span!(
            "job",
            job_id = %job.id,
            filename = %job.filename,
        );
        let _entered = span.enter();

        let _guard = ArtifactGuard {
            stage: &self.stage,
            job_id,
            artifact_ref: &message.artifact_ref,
        };

        if job.status == JobStatus::Processing {
            log::warn!("Resuming job {} left in processing by a previous worker", job_id);
        } else {
            self.store
                .update_status(job_id, JobStatus::Processing, None)?;
        }

        let started = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run(&job, message)))
            .unwrap_or_else(|payload| Err(ExecutionFailure::Panicked(panic_message(payload))));

        let outcome = match result {
            Ok(output) => {
                self.record_terminal(job_id, JobStatus::Completed, &output)?;
                log::info!(
                    "Job {} completed in {:.1}s",
                    job_id,
                    started.elapsed().as_secs_f64()
                );
                Outcome::Completed
            }
            Err(failure) => {
                let description = failure.describe();
                self.record_terminal(job_id, JobStatus::Failed, &description)?;
                log::warn!("Job {} failed: {}", job_id, failure);
                Outcome::Failed(description)
            }
        };

        Ok(outcome)
    }

    fn record_terminal(
        &self,
        job_id: &str,
        status: JobStatus,
        result: &str,
    ) -> Result<(), StoreError> {
        self.store
            .update_status(job_id, status, Some(result))
            .inspect_err(|e| {
                log::error!(
                    "Job {} left in processing: could not record it as {}: {}",
                    job_id,
                    status,
                    e
                )
            })
    }

    fn run(&self, job: &Job, message: &DispatchMessage) -> Result<String, ExecutionFailure> {
        let artifact = self.locate_artifact(&job.id, &message.artifact_ref)?;
        log::debug!("Extracting text from {}", redact_path(&artifact));

        let text = {
            let _span = tracing::info_span!("extract").entered();
            self.extractor.extract_text(&artifact)?
        };

        let request = AnalysisRequest {
            job_id: job.id.clone(),
            filename: job.filename.clone(),
            query: message.query.clone(),
            text,
        };
        Ok(self.analyze_with_deadline(request)?)
    }

    fn locate_artifact(&self, job_id: &str, artifact_ref: &Path) -> Result<PathBuf, StageError> {
        if artifact_ref.is_file() {
            return Ok(artifact_ref.to_path_buf());
        }
        self.stage.resolve(job_id)
    }

    /// Runs the analyst on a helper thread. On timeout the thread is left to
    /// finish on its own and its result is dropped.
    fn analyze_with_deadline(&self, request: AnalysisRequest) -> Result<String, AnalysisError> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let analyst = Arc::clone(&self.analyst);
        let parent = tracing::Span::current();

        thread::Builder::new()
            .name(format!("analysis-{}", request.job_id))
            .spawn(move || {
                let _entered = parent.entered();
                let _span = tracing::info_span!("analysis").entered();
                let result = panic::catch_unwind(AssertUnwindSafe(|| analyst.analyze(&request)))
                    .unwrap_or_else(|payload| {
                        Err(AnalysisError::Aborted(format!(
                            "analyst panicked: {}",
                            panic_message(payload)
                        )))
                    });
                let _ = tx.send(result);
            })
            .map_err(|e| AnalysisError::Aborted(format!("failed to start analysis thread: {}", e)))?;

        match rx.recv_timeout(self.analysis_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(AnalysisError::Timeout(self.analysis_timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(AnalysisError::Aborted(
                "analysis thread exited without a result".to_string(),
            )),
        }
    }

    fn discard_quietly(&self, job_id: &str) {
        if let Err(e) = self.stage.discard(job_id) {
            log::debug!("Artifact cleanup for job {} failed: {}", job_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::TempDir;

    struct FixedText(&'static str);

    impl TextExtractor for FixedText {
        fn extract_text(&self, _path: &Path) -> Result<String, ProcessError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingExtractor;

    impl TextExtractor for FailingExtractor {
        fn extract_text(&self, _path: &Path) -> Result<String, ProcessError> {
            Err(ProcessError::PdfProcessing("Failed to load PDF: bad xref".to_string()))
        }
    }

    struct EchoAnalyst;

    impl Analyst for EchoAnalyst {
        fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
            Ok(format!("{} | {}", request.query, request.text))
        }
    }

    struct SlowAnalyst(Duration);

    impl Analyst for SlowAnalyst {
        fn analyze(&self, _request: &AnalysisRequest) -> Result<String, AnalysisError> {
            thread::sleep(self.0);
            Ok("too late".to_string())
        }
    }

    struct PanickingAnalyst;

    impl Analyst for PanickingAnalyst {
        fn analyze(&self, _request: &AnalysisRequest) -> Result<String, AnalysisError> {
            panic!("model exploded")
        }
    }

    /// Deletes the job out from under the executor while analysing.
    struct VanishingJob(JobStore);

    impl Analyst for VanishingJob {
        fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
            self.0.delete(&request.job_id).unwrap();
            Ok("orphaned".to_string())
        }
    }

    struct Fixture {
        _dir: TempDir,
        store: JobStore,
        stage: Arc<ArtifactStage>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let stage = Arc::new(ArtifactStage::new(dir.path().join("staging")).unwrap());
            Self {
                store: JobStore::new(Database::open_in_memory().unwrap()),
                stage,
                _dir: dir,
            }
        }

        fn executor(
            &self,
            extractor: Arc<dyn TextExtractor>,
            analyst: Arc<dyn Analyst>,
            timeout: Duration,
        ) -> JobExecutor {
            JobExecutor::new(
                self.store.clone(),
                Arc::clone(&self.stage),
                extractor,
                analyst,
                timeout,
            )
        }

        fn submit(&self, id: &str) -> DispatchMessage {
            let path = self.stage.stage_bytes(id, "pdf", b"%PDF-1.5").unwrap();
            self.store.create(id, "report.pdf", "Summarize").unwrap();
            DispatchMessage::new(id, path, "Summarize")
        }
    }

    #[test]
    fn test_successful_execution() {
        let fx = Fixture::new();
        let message = fx.submit("j1");
        let executor = fx.executor(
            Arc::new(FixedText("Revenue 10M")),
            Arc::new(EchoAnalyst),
            Duration::from_secs(5),
        );

        assert_eq!(executor.execute(&message).unwrap(), Outcome::Completed);

        let job = fx.store.get("j1").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.as_deref(), Some("Summarize | Revenue 10M"));
        assert!(!message.artifact_ref.exists());
    }

    #[test]
    fn test_extraction_failure_marks_failed() {
        let fx = Fixture::new();
        let message = fx.submit("j1");
        let executor = fx.executor(
            Arc::new(FailingExtractor),
            Arc::new(EchoAnalyst),
            Duration::from_secs(5),
        );

        match executor.execute(&message).unwrap() {
            Outcome::Failed(description) => {
                assert!(description.starts_with("Error: "));
                assert!(description.contains("bad xref"));
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
        assert_eq!(fx.store.get("j1").unwrap().status, JobStatus::Failed);
        assert!(!message.artifact_ref.exists());
    }

    #[test]
    fn test_timeout_marks_failed() {
        let fx = Fixture::new();
        let message = fx.submit("j1");
        let executor = fx.executor(
            Arc::new(FixedText("text")),
            Arc::new(SlowAnalyst(Duration::from_secs(2))),
            Duration::from_millis(100),
        );

        let started = Instant::now();
        assert!(matches!(executor.execute(&message).unwrap(), Outcome::Failed(_)));
        assert!(started.elapsed() < Duration::from_secs(2));

        let job = fx.store.get("j1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.unwrap().contains("timed out"));
        assert!(!message.artifact_ref.exists());
    }

    #[test]
    fn test_panicking_analyst_marks_failed() {
        let fx = Fixture::new();
        let message = fx.submit("j1");
        let executor = fx.executor(
            Arc::new(FixedText("text")),
            Arc::new(PanickingAnalyst),
            Duration::from_secs(5),
        );

        assert!(matches!(executor.execute(&message).unwrap(), Outcome::Failed(_)));
        let job = fx.store.get("j1").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.unwrap().contains("model exploded"));
        assert!(!message.artifact_ref.exists());
    }

    #[test]
    fn test_missing_artifact_marks_failed() {
        let fx = Fixture::new();
        let message = fx.submit("j1");
        std::fs::remove_file(&message.artifact_ref).unwrap();

        let executor = fx.executor(
            Arc::new(FixedText("text")),
            Arc::new(EchoAnalyst),
            Duration::from_secs(5),
        );
        assert!(matches!(executor.execute(&message).unwrap(), Outcome::Failed(_)));
        assert_eq!(fx.store.get("j1").unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn test_redelivery_of_terminal_job_is_skipped() {
        let fx = Fixture::new();
        let message = fx.submit("j1");
        let executor = fx.executor(
            Arc::new(FixedText("text")),
            Arc::new(EchoAnalyst),
            Duration::from_secs(5),
        );

        executor.execute(&message).unwrap();
        let first = fx.store.get("j1").unwrap();

        assert_eq!(
            executor.execute(&message).unwrap(),
            Outcome::Skipped(SkipReason::AlreadyTerminal(JobStatus::Completed))
        );
        let second = fx.store.get("j1").unwrap();
        assert_eq!(first.result, second.result);
        assert_eq!(first.updated_at, second.updated_at);
    }

    #[test]
    fn test_unknown_job_is_skipped() {
        let fx = Fixture::new();
        let path = fx.stage.stage_bytes("ghost", "pdf", b"x").unwrap();
        let executor = fx.executor(
            Arc::new(FixedText("text")),
            Arc::new(EchoAnalyst),
            Duration::from_secs(5),
        );

        let message = DispatchMessage::new("ghost", path.clone(), "q");
        assert_eq!(
            executor.execute(&message).unwrap(),
            Outcome::Skipped(SkipReason::JobMissing)
        );
        assert!(!path.exists());
    }

    #[test]
    fn test_processing_job_is_resumed() {
        let fx = Fixture::new();
        let message = fx.submit("j1");
        fx.store
            .update_status("j1", JobStatus::Processing, None)
            .unwrap();

        let executor = fx.executor(
            Arc::new(FixedText("text")),
            Arc::new(EchoAnalyst),
            Duration::from_secs(5),
        );
        assert_eq!(executor.execute(&message).unwrap(), Outcome::Completed);
        assert_eq!(fx.store.get("j1").unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_failed_terminal_write_is_reported() {
        let fx = Fixture::new();
        let message = fx.submit("j1");
        let executor = fx.executor(
            Arc::new(FixedText("text")),
            Arc::new(VanishingJob(fx.store.clone())),
            Duration::from_secs(5),
        );

        assert!(matches!(
            executor.execute(&message),
            Err(StoreError::NotFound(id)) if id == "j1"
        ));
        assert!(!message.artifact_ref.exists());
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new("owned".to_string())), "owned");
        assert_eq!(panic_message(Box::new(42)), "unknown panic");
    }
}
