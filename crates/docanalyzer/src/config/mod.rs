pub mod loader;
pub mod schema;

pub use loader::{
    apply_env_overrides, load_config, load_config_from_str, load_or_default, validate_config,
};
pub use schema::{
    AnalysisConfig, Config, LogFormat, LoggingConfig, QueueBackend, QueueConfig, ServerConfig,
    StorageConfig, UploadConfig, WorkerConfig,
};
