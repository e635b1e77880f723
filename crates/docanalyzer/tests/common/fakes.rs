//! Scripted collaborators for driving the worker pipeline.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use docanalyzer::error::{AnalysisError, ProcessError, QueueError};
use docanalyzer::queue::{Delivery, DispatchMessage, DispatchQueue};
use docanalyzer::{AnalysisRequest, Analyst, TextExtractor};

/// How a [`ScriptedAnalyst`] responds.
#[derive(Debug, Clone)]
pub enum Script {
    /// Returns `"<query>\n\n<text>"`.
    Echo,
    Fail(String),
    Sleep(Duration),
    Panic,
}

/// Analyst that follows a script and counts calls per job.
pub struct ScriptedAnalyst {
    script: Script,
    calls: AtomicUsize,
    per_job: Mutex<HashMap<String, usize>>,
}

impl ScriptedAnalyst {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            per_job: Mutex::new(HashMap::new()),
        }
    }

    pub fn echo() -> Self {
        Self::new(Script::Echo)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, job_id: &str) -> usize {
        self.per_job
            .lock()
            .unwrap()
            .get(job_id)
            .copied()
            .unwrap_or(0)
    }
}

impl Analyst for ScriptedAnalyst {
    fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .per_job
            .lock()
            .unwrap()
            .entry(request.job_id.clone())
            .or_insert(0) += 1;

        match &self.script {
            Script::Echo => Ok(format!("{}\n\n{}", request.query, request.text)),
            Script::Fail(message) => Err(AnalysisError::Provider {
                status: 503,
                body: message.clone(),
            }),
            Script::Sleep(duration) => {
                thread::sleep(*duration);
                Ok("too late".to_string())
            }
            Script::Panic => panic!("analyst exploded"),
        }
    }
}

/// Extractor that returns the same text for every document.
pub struct FixedExtractor(pub String);

impl TextExtractor for FixedExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, ProcessError> {
        if !path.exists() {
            return Err(ProcessError::ReadDocument {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        Ok(self.0.clone())
    }
}

/// Extractor that takes `delay` per document and counts calls.
pub struct SlowExtractor {
    pub text: String,
    pub delay: Duration,
    calls: AtomicUsize,
}

impl SlowExtractor {
    pub fn new(text: &str, delay: Duration) -> Self {
        Self {
            text: text.to_string(),
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextExtractor for SlowExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, ProcessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        if !path.exists() {
            return Err(ProcessError::ReadDocument {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        Ok(self.text.clone())
    }
}

/// A queue whose broker is never reachable.
pub struct UnreachableQueue;

impl DispatchQueue for UnreachableQueue {
    fn enqueue(&self, _message: &DispatchMessage) -> Result<(), QueueError> {
        Err(QueueError::BrokerUnavailable(
            "connection refused".to_string(),
        ))
    }

    fn dequeue(&self, _timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        Err(QueueError::BrokerUnavailable(
            "connection refused".to_string(),
        ))
    }

    fn ack(&self, _delivery: &Delivery) -> Result<(), QueueError> {
        Ok(())
    }

    fn depth(&self) -> Result<u64, QueueError> {
        Ok(0)
    }

    fn name(&self) -> &'static str {
        "unreachable"
    }
}
