//! Test harness for isolated end-to-end runs.
//!
//! Each `TestHarness` owns a temp directory holding the SQLite database and
//! the staging directory, plus a `Runtime` wired from a test config.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use docanalyzer::config::Config;
use docanalyzer::queue::DispatchQueue;
use docanalyzer::{Analyst, JobStatusView, Runtime, TextExtractor, WorkerPool};

use super::builders::ConfigBuilder;

pub struct TestHarness {
    temp_dir: TempDir,
    pub runtime: Runtime,
}

impl TestHarness {
    /// Harness with the default test config.
    pub fn new() -> Self {
        Self::with(|builder| builder)
    }

    /// Harness with a customised config.
    pub fn with(customise: impl FnOnce(ConfigBuilder) -> ConfigBuilder) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = customise(ConfigBuilder::new(temp_dir.path())).build();
        let runtime = Runtime::open(config).expect("Failed to open runtime");
        Self { temp_dir, runtime }
    }

    /// Harness whose submissions go through the given queue.
    pub fn with_queue(queue: Arc<dyn DispatchQueue>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = ConfigBuilder::new(temp_dir.path()).build();
        let base = Runtime::open(config.clone()).expect("Failed to open runtime");
        let runtime = Runtime::from_parts(
            config,
            base.store().clone(),
            Arc::clone(base.stage()),
            queue,
        );
        Self { temp_dir, runtime }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> &Config {
        self.runtime.config()
    }

    /// Reopens the same database and staging directory in a fresh runtime,
    /// as a restarted process would.
    pub fn reopen(&self) -> Runtime {
        Runtime::open(self.config().clone()).expect("Failed to reopen runtime")
    }

    /// Starts workers using the given collaborators.
    pub fn start_workers(
        &self,
        extractor: Arc<dyn TextExtractor>,
        analyst: Arc<dyn Analyst>,
    ) -> WorkerPool {
        let executor = self.runtime.executor(extractor, analyst);
        self.runtime
            .start_workers(executor)
            .expect("Failed to start workers")
    }

    /// Number of entries currently in the staging directory.
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.runtime.stage().staging_dir())
            .expect("Failed to read staging dir")
            .count()
    }

    /// Polls status until the job is terminal, panicking after `timeout`.
    pub fn wait_for_terminal(&self, job_id: &str, timeout: Duration) -> JobStatusView {
        let deadline = Instant::now() + timeout;
        loop {
            let view = self
                .runtime
                .service()
                .status(job_id)
                .expect("Job should exist");
            assert_result_matches_status(&view);
            if view.status.is_terminal() {
                return view;
            }
            assert!(
                Instant::now() < deadline,
                "job {} still {} after {:?}",
                job_id,
                view.status,
                timeout
            );
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Polls until the queue holds no messages.
    pub fn wait_for_empty_queue(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while self.runtime.queue().depth().expect("depth") > 0 {
            assert!(Instant::now() < deadline, "queue never drained");
            thread::sleep(Duration::from_millis(10));
        }
    }
}

/// The result is present exactly when the status is terminal.
pub fn assert_result_matches_status(view: &JobStatusView) {
    assert_eq!(
        view.result.is_some(),
        view.status.is_terminal(),
        "status {} with result {:?}",
        view.status,
        view.result
    );
}
