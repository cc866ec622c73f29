//! Orchestrator error types.

use thiserror::Error;

pub type ProcessResult<T> = Result<T, ProcessError>;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Transformation failed: {0}")]
    Transform(String),

    #[error("Transformation timed out after {0:?}")]
    TransformTimeout(std::time::Duration),

    #[error("Registry error: {0}")]
    Registry(#[from] clipflow_registry::RegistryError),

    #[error("Storage error: {0}")]
    Storage(#[from] clipflow_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }
}
