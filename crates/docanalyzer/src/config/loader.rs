use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::config::schema::{Config, CONFIG_VERSION};
use crate::error::ConfigError;

pub const ENV_DATABASE_PATH: &str = "DOCANALYZER_DATABASE_PATH";
pub const ENV_STAGING_DIR: &str = "DOCANALYZER_STAGING_DIR";
pub const ENV_BIND: &str = "DOCANALYZER_BIND";
pub const ENV_WORKERS: &str = "DOCANALYZER_WORKERS";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Loads the file when given, otherwise defaults; then applies environment
/// overrides and validates the result.
pub fn load_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config)?;
    Ok(config)
}

/// Applies `DOCANALYZER_*` overrides read through `lookup`.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(path) = lookup(ENV_DATABASE_PATH) {
        config.storage.database_path = Some(PathBuf::from(path));
    }
    if let Some(dir) = lookup(ENV_STAGING_DIR) {
        config.storage.staging_dir = Some(PathBuf::from(dir));
    }
    if let Some(bind) = lookup(ENV_BIND) {
        config.server.bind = bind;
    }
    if let Some(workers) = lookup(ENV_WORKERS) {
        config.worker.worker_count =
            workers
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv {
                    name: ENV_WORKERS.to_string(),
                    value: workers.clone(),
                })?;
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(invalid(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    if config.server.bind.parse::<SocketAddr>().is_err() {
        return Err(invalid(format!(
            "server.bind is not a socket address: {}",
            config.server.bind
        )));
    }

    if config.upload.accepted_extensions.is_empty() {
        return Err(invalid("upload.accepted_extensions must not be empty"));
    }
    for ext in &config.upload.accepted_extensions {
        let ext = ext.trim_start_matches('.');
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid(format!("Invalid accepted extension: '{}'", ext)));
        }
    }
    if config.upload.max_upload_bytes == 0 {
        return Err(invalid("upload.max_upload_bytes must be greater than 0"));
    }

    if config.worker.worker_count == 0 {
        return Err(invalid("worker.worker_count must be greater than 0"));
    }
    if config.worker.analysis_timeout_secs == 0 {
        return Err(invalid("worker.analysis_timeout_secs must be greater than 0"));
    }

    // A lease shorter than the analysis deadline would hand a running job
    // to a second worker.
    if config.queue.lease_secs <= config.worker.analysis_timeout_secs {
        return Err(invalid(format!(
            "queue.lease_secs ({}) must exceed worker.analysis_timeout_secs ({})",
            config.queue.lease_secs, config.worker.analysis_timeout_secs
        )));
    }
    if config.queue.capacity == 0 {
        return Err(invalid("queue.capacity must be greater than 0"));
    }

    if config.analysis.steps.is_empty() {
        return Err(invalid("analysis.steps must list at least one step"));
    }
    if config.analysis.base_url.trim().is_empty() {
        return Err(invalid("analysis.base_url must not be empty"));
    }
    if config.analysis.max_document_chars == 0 {
        return Err(invalid("analysis.max_document_chars must be greater than 0"));
    }

    Ok(())
}
