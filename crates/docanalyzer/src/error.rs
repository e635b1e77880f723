use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Staging error: {0}")]
    Stage(#[from] StageError),

    #[error("Dispatch error: {0}")]
    Queue(#[from] QueueError),

    #[error("Submission error: {0}")]
    Submit(#[from] SubmitError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Logging error: {0}")]
    Logging(#[from] crate::logging::LoggingError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl AnalyzerError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid value for environment variable '{name}': {value}")]
    InvalidEnv { name: String, value: String },

    #[error("Failed to resolve analysis API key: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Job '{0}' already exists")]
    DuplicateId(String),

    #[error("Job '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Failed to write artifact '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No staged artifact for job '{0}'")]
    NotFound(String),

    #[error("Invalid artifact id '{0}'")]
    InvalidId(String),
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Dispatch channel unavailable: {0}")]
    BrokerUnavailable(String),
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Document contains no extractable text")]
    EmptyDocument,
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Analysis request failed: {0}")]
    Request(String),

    #[error("Analysis provider returned status {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Failed to parse analysis response: {0}")]
    ResponseParse(String),

    #[error("Analysis produced no output")]
    EmptyOutput,

    #[error("Analysis timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Analysis aborted: {0}")]
    Aborted(String),
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Unsupported file type '{filename}'. Accepted extensions: {accepted}")]
    UnsupportedMediaType { filename: String, accepted: String },

    #[error("Uploaded file '{0}' is empty")]
    EmptyFile(String),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker count must be greater than zero")]
    NoWorkers,
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
