//! Configuration loading from disk.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::schema::SupervisorConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::engine::model::{EngineConfig, ModelError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing settings failed: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("parsing engine config {path} failed: {source}")]
    EngineConfig {
        path: PathBuf,
        #[source]
        source: ModelError,
    },

    #[error("engine config {0} declares no routing balancer")]
    MissingBalancer(PathBuf),

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load supervisor settings from a TOML file. Validation happens after the
/// environment overlay, see [`crate::config::cli::Cli::resolve`].
pub fn load_settings(path: &Path) -> Result<SupervisorConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

pub fn validate(config: SupervisorConfig) -> Result<SupervisorConfig, ConfigError> {
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load the bootstrap engine config. Its first balancer is the one managed by
/// reconciliation, so a config without one is rejected.
pub async fn load_engine_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = tokio::fs::read(path).await.map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = EngineConfig::from_slice(&content).map_err(|source| ConfigError::EngineConfig {
        path: path.to_path_buf(),
        source,
    })?;

    if config.first_balancer().is_none() {
        return Err(ConfigError::MissingBalancer(path.to_path_buf()));
    }
    Ok(config)
}
