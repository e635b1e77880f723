//! Shared helpers for HTTP integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use docanalyzer::config::{Config, QueueBackend};
use docanalyzer::error::{AnalysisError, ProcessError, QueueError};
use docanalyzer::queue::{Delivery, DispatchMessage, DispatchQueue};
use docanalyzer::{AnalysisRequest, Analyst, Runtime, TextExtractor};
use docanalyzer_server::{build_router, AppState};

pub const BOUNDARY: &str = "X-DOCANALYZER-TEST-BOUNDARY";

/// An isolated app: temp storage, a runtime and the router over it.
pub struct TestApp {
    pub dir: TempDir,
    pub runtime: Runtime,
    pub router: Router,
}

pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.database_path = Some(dir.path().join("jobs.db"));
    config.storage.staging_dir = Some(dir.path().join("staging"));
    config.queue.backend = QueueBackend::Sqlite;
    config.queue.poll_interval_ms = 10;
    config.worker.worker_count = 1;
    config.worker.poll_timeout_ms = 20;
    config.worker.analysis_timeout_secs = 5;
    config.analysis.api_key = Some("sk-test".to_string());
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(customise: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        customise(&mut config);
        let runtime = Runtime::open(config).unwrap();
        let router = build_router(AppState::new(runtime.clone()));
        Self {
            dir,
            runtime,
            router,
        }
    }

    /// App whose submissions are dispatched through `queue`.
    pub fn with_queue(queue: Arc<dyn DispatchQueue>) -> Self {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let base = Runtime::open(config.clone()).unwrap();
        let runtime = Runtime::from_parts(
            config,
            base.store().clone(),
            Arc::clone(base.stage()),
            queue,
        );
        let router = build_router(AppState::new(runtime.clone()));
        Self {
            dir,
            runtime,
            router,
        }
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_multipart(&self, uri: &str, parts: &[Part<'_>]) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Uploads `bytes` as `filename` with an optional query.
    pub async fn analyze(
        &self,
        filename: &str,
        bytes: &[u8],
        query: Option<&str>,
    ) -> Response<Body> {
        let mut parts = vec![Part::File {
            name: "file",
            filename,
            bytes,
        }];
        if let Some(query) = query {
            parts.push(Part::Text {
                name: "query",
                value: query,
            });
        }
        self.post_multipart("/analyze", &parts).await
    }

    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.runtime.stage().staging_dir())
            .unwrap()
            .count()
    }

    /// Polls the status endpoint until the job is terminal.
    pub async fn poll_until_terminal(&self, poll_url: &str) -> serde_json::Value {
        for _ in 0..500 {
            let response = self.get(poll_url).await;
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            if json["status"] == "completed" || json["status"] == "failed" {
                return json;
            }
            assert!(json.get("result").is_none());
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job at {} never finished", poll_url);
    }
}

/// One multipart form field.
pub enum Part<'a> {
    Text {
        name: &'a str,
        value: &'a str,
    },
    File {
        name: &'a str,
        filename: &'a str,
        bytes: &'a [u8],
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                filename,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Extractor returning fixed text for any existing file.
pub struct FixedExtractor;

impl TextExtractor for FixedExtractor {
    fn extract_text(&self, path: &std::path::Path) -> Result<String, ProcessError> {
        std::fs::metadata(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok("Total assets 9.1B".to_string())
    }
}

/// Analyst that echoes the query, or fails when asked to.
pub struct EchoAnalyst;

impl Analyst for EchoAnalyst {
    fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        if request.query == "fail" {
            return Err(AnalysisError::Provider {
                status: 500,
                body: "upstream exploded".to_string(),
            });
        }
        Ok(format!("Answer to '{}': {}", request.query, request.text))
    }
}

pub struct UnreachableQueue;

impl DispatchQueue for UnreachableQueue {
    fn enqueue(&self, _message: &DispatchMessage) -> Result<(), QueueError> {
        Err(QueueError::BrokerUnavailable(
            "connection refused".to_string(),
        ))
    }

    fn dequeue(&self, _timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        Ok(None)
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
