use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisStep;

pub const CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
            upload: UploadConfig::default(),
            worker: WorkerConfig::default(),
            queue: QueueConfig::default(),
            analysis: AnalysisConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Data directory root: `~/.docanalyzer`.
pub fn default_data_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".docanalyzer")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Defaults to `~/.docanalyzer/data/docanalyzer.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Defaults to `~/.docanalyzer/staging`.
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            crate::db::default_database_path()
                .unwrap_or_else(|| default_data_root().join("data").join("docanalyzer.db"))
        })
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| default_data_root().join("staging"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Case-insensitive, without the leading dot.
    #[serde(default = "default_accepted_extensions")]
    pub accepted_extensions: Vec<String>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_accepted_extensions() -> Vec<String> {
    vec!["pdf".to_string()]
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            accepted_extensions: default_accepted_extensions(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_analysis_timeout_secs")]
    pub analysis_timeout_secs: u64,
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_analysis_timeout_secs() -> u64 {
    600
}

fn default_poll_timeout_ms() -> u64 {
    100
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            analysis_timeout_secs: default_analysis_timeout_secs(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// Durable table in the job database; usable across processes.
    Sqlite,
    /// In-process channel; lost on restart.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_backend")]
    pub backend: QueueBackend,
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

fn default_backend() -> QueueBackend {
    QueueBackend::Sqlite
}

fn default_lease_secs() -> u64 {
    900
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_capacity() -> usize {
    1024
}

fn default_send_timeout_ms() -> u64 {
    1000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            lease_secs: default_lease_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            capacity: default_capacity(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Root of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Direct API key (not recommended outside local testing).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Path to a file holding the API key.
    #[serde(default)]
    pub api_key_file: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: Option<String>,
    #[serde(default = "default_steps")]
    pub steps: Vec<AnalysisStep>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: usize,
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_api_key_env_var() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}

fn default_steps() -> Vec<AnalysisStep> {
    vec![AnalysisStep::FinancialAnalysis]
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_max_document_chars() -> usize {
    200_000
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
            steps: default_steps(),
            request_timeout_secs: default_request_timeout_secs(),
            max_document_chars: default_max_document_chars(),
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_log_filter() -> String {
    "docanalyzer=info,docanalyzer_server=info,tower_http=info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            format: default_log_format(),
        }
    }
}
