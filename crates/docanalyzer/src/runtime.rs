//! Wires configured components together for the server and worker binaries.

use std::sync::Arc;
use std::time::Duration;

use crate::analysis::{Analyst, OpenAiClient, StepwiseAnalyst};
use crate::config::{AnalysisConfig, Config, QueueBackend};
use crate::db::Database;
use crate::error::{ConfigError, Result};
use crate::extract::{ExtractorRegistry, TextExtractor};
use crate::queue::{ChannelQueue, DispatchQueue, SqliteQueue};
use crate::secrets::resolve_secret_optional;
use crate::service::AnalysisService;
use crate::stage::ArtifactStage;
use crate::store::JobStore;
use crate::worker::{JobExecutor, WorkerPool};

/// Builds the default analyst: configured steps over the OpenAI-compatible client.
pub fn build_analyst(
    config: &AnalysisConfig,
) -> std::result::Result<StepwiseAnalyst<OpenAiClient>, ConfigError> {
    let api_key = resolve_secret_optional(
        config.api_key.as_deref(),
        config.api_key_file.as_deref(),
        config.api_key_env_var.as_deref(),
    )?;
    if api_key.is_none() {
        log::warn!(
            "No API key configured for {}; requests are sent unauthenticated",
            config.base_url
        );
    }

    let client = OpenAiClient::new(
        config.base_url.clone(),
        config.model.clone(),
        api_key,
        Duration::from_secs(config.request_timeout_secs),
    )
    .with_temperature(config.temperature);

    Ok(StepwiseAnalyst::new(
        client,
        config.steps.clone(),
        config.max_document_chars,
    ))
}

fn build_queue(config: &Config, db: &Database) -> Arc<dyn DispatchQueue> {
    match config.queue.backend {
        QueueBackend::Sqlite => Arc::new(SqliteQueue::new(
            db.clone(),
            Duration::from_secs(config.queue.lease_secs),
            Duration::from_millis(config.queue.poll_interval_ms),
        )),
        QueueBackend::Memory => Arc::new(ChannelQueue::new(
            config.queue.capacity,
            Duration::from_millis(config.queue.send_timeout_ms),
        )),
    }
}

/// Shared handles for one process.
#[derive(Clone)]
pub struct Runtime {
    config: Arc<Config>,
    store: JobStore,
    stage: Arc<ArtifactStage>,
    queue: Arc<dyn DispatchQueue>,
    service: AnalysisService,
}

impl Runtime {
    /// Opens the configured database and staging directory.
    pub fn open(config: Config) -> Result<Self> {
        let db = Database::open(&config.storage.database_path())?;
        Self::with_database(config, db)
    }

    pub fn with_database(config: Config, db: Database) -> Result<Self> {
        let stage = Arc::new(ArtifactStage::new(config.storage.staging_dir())?);
        let queue = build_queue(&config, &db);
        Ok(Self::from_parts(config, JobStore::new(db), stage, queue))
    }

    /// Assembles a runtime around explicit components.
    pub fn from_parts(
        config: Config,
        store: JobStore,
        stage: Arc<ArtifactStage>,
        queue: Arc<dyn DispatchQueue>,
    ) -> Self {
        let service = AnalysisService::new(
            store.clone(),
            Arc::clone(&stage),
            Arc::clone(&queue),
            config.upload.accepted_extensions.clone(),
        );
        Self {
            config: Arc::new(config),
            store,
            stage,
            queue,
            service,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn stage(&self) -> &Arc<ArtifactStage> {
        &self.stage
    }

    pub fn queue(&self) -> &Arc<dyn DispatchQueue> {
        &self.queue
    }

    pub fn service(&self) -> &AnalysisService {
        &self.service
    }

    pub fn executor(
        &self,
        extractor: Arc<dyn TextExtractor>,
        analyst: Arc<dyn Analyst>,
    ) -> Arc<JobExecutor> {
        Arc::new(JobExecutor::new(
            self.store.clone(),
            Arc::clone(&self.stage),
            extractor,
            analyst,
            Duration::from_secs(self.config.worker.analysis_timeout_secs),
        ))
    }

    /// Executor with the PDF/text extractor and the configured analyst.
    pub fn default_executor(&self) -> Result<Arc<JobExecutor>> {
        let analyst = build_analyst(&self.config.analysis)?;
        Ok(self.executor(Arc::new(ExtractorRegistry::new()), Arc::new(analyst)))
    }

    pub fn start_workers(&self, executor: Arc<JobExecutor>) -> Result<WorkerPool> {
        Ok(WorkerPool::with_poll_timeout(
            executor,
            Arc::clone(&self.queue),
            self.config.worker.worker_count,
            Duration::from_millis(self.config.worker.poll_timeout_ms),
        )?)
    }
}
