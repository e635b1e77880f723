//! Builders for test configs and documents.

#![allow(dead_code)]

use std::path::Path;

use docanalyzer::analysis::AnalysisStep;
use docanalyzer::config::{Config, QueueBackend};

/// Builder for `Config` instances rooted in a scratch directory.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Sensible test defaults: one worker, short polls, SQLite queue.
    pub fn new(root: &Path) -> Self {
        let mut config = Config::default();
        config.storage.database_path = Some(root.join("data").join("jobs.db"));
        config.storage.staging_dir = Some(root.join("staging"));
        config.worker.worker_count = 1;
        config.worker.poll_timeout_ms = 20;
        config.worker.analysis_timeout_secs = 5;
        config.queue.backend = QueueBackend::Sqlite;
        config.queue.lease_secs = 30;
        config.queue.poll_interval_ms = 10;
        config.analysis.api_key = Some("sk-test".to_string());
        Self { config }
    }

    pub fn backend(mut self, backend: QueueBackend) -> Self {
        self.config.queue.backend = backend;
        self
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker.worker_count = count;
        self
    }

    pub fn analysis_timeout_secs(mut self, secs: u64) -> Self {
        self.config.worker.analysis_timeout_secs = secs;
        self
    }

    pub fn lease_secs(mut self, secs: u64) -> Self {
        self.config.queue.lease_secs = secs;
        self
    }

    pub fn accepted_extensions(mut self, extensions: &[&str]) -> Self {
        self.config.upload.accepted_extensions =
            extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn steps(mut self, steps: Vec<AnalysisStep>) -> Self {
        self.config.analysis.steps = steps;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// A one-page PDF whose content stream shows `line` in Courier.
pub fn pdf_with_text(line: &str) -> Vec<u8> {
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", line);
    let content_id = doc.add_object(Object::Stream(Stream::new(
        dictionary! {},
        content.into_bytes(),
    )));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to serialize test PDF");
    bytes
}
