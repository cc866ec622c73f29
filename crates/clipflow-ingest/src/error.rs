//! Ingestion gateway error types.

use thiserror::Error;

pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Non-sequential write: expected offset {expected}, got {got}")]
    NonSequentialWrite { expected: u64, got: u64 },

    #[error("Upload already finished")]
    UploadFinished,

    #[error("Upload failed mid-stream; refusing to commit an incomplete object")]
    UploadPoisoned,

    #[error("Storage error: {0}")]
    Storage(#[from] clipflow_storage::StorageError),

    #[error("Registry error: {0}")]
    Registry(#[from] clipflow_registry::RegistryError),

    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("Host key error: {0}")]
    HostKey(#[from] russh_keys::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
