pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod job;
pub mod logging;
pub mod queue;
pub mod runtime;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod stage;
pub mod store;
pub mod worker;

pub use analysis::{AnalysisRequest, AnalysisStep, Analyst, StepwiseAnalyst, DEFAULT_QUERY};
pub use config::{load_config, load_or_default, Config};
pub use db::Database;
pub use error::{
    AnalysisError, AnalyzerError, ConfigError, ProcessError, QueueError, Result, StageError,
    StoreError, SubmitError, WorkerError,
};
pub use extract::{DocumentFormat, ExtractorRegistry, TextExtractor};
pub use job::{Job, JobStatus, JobStatusView};
pub use queue::{DispatchMessage, DispatchQueue};
pub use runtime::Runtime;
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use service::{AnalysisService, JobCounts};
pub use stage::ArtifactStage;
pub use store::JobStore;
pub use worker::{JobExecutor, Outcome, WorkerPool};
