//! Rendering the engine configuration to disk.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;

use crate::engine::model::{EngineConfig, ModelError};

/// File name of the rendered configuration inside its private directory.
pub const RENDERED_FILE_NAME: &str = "config.json";

/// Errors raised while writing a configuration file.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Encode(#[from] ModelError),

    #[error("writing {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Serialize `config` and replace the contents of `path` with it.
pub async fn write_config(path: &Path, config: &EngineConfig) -> Result<(), RenderError> {
    let data = config.to_vec()?;
    tokio::fs::write(path, data)
        .await
        .map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// The live configuration file the engine process is launched against.
///
/// Lives in a private temporary directory that is removed when this value is
/// dropped, i.e. when the supervisor exits.
#[derive(Debug)]
pub struct RenderedConfig {
    _dir: TempDir,
    path: PathBuf,
}

impl RenderedConfig {
    /// Create the private directory and write the initial configuration.
    pub async fn create(config: &EngineConfig) -> Result<Self, RenderError> {
        let dir = tempfile::Builder::new()
            .prefix("engine-")
            .tempdir()
            .map_err(|source| RenderError::Io {
                path: std::env::temp_dir(),
                source,
            })?;
        let path = dir.path().join(RENDERED_FILE_NAME);
        write_config(&path, config).await?;

        tracing::debug!(path = %path.display(), "Rendered engine config");
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
