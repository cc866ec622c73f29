//! Ingestion gateway configuration.

use std::path::PathBuf;

use crate::error::{IngestError, IngestResult};

/// SFTP gateway configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// The single accepted transfer username; doubles as the uploader id
    /// and storage namespace
    pub username: String,
    /// Password for the transfer username
    pub password: String,
    /// Persistent host key path; a fresh ed25519 key is generated per
    /// process start when unset
    pub host_key_path: Option<PathBuf>,
    /// Bucket receiving raw uploads
    pub raw_bucket: String,
}

impl IngestConfig {
    /// Create config from environment variables.
    ///
    /// The credential pair is required; bind address and bucket have
    /// defaults.
    pub fn from_env() -> IngestResult<Self> {
        let username = std::env::var("SFTP_USERNAME")
            .map_err(|_| IngestError::config_error("SFTP_USERNAME not set"))?;
        let password = std::env::var("SFTP_PASSWORD")
            .map_err(|_| IngestError::config_error("SFTP_PASSWORD not set"))?;

        if username.is_empty() || password.is_empty() {
            return Err(IngestError::config_error(
                "SFTP_USERNAME and SFTP_PASSWORD cannot be empty",
            ));
        }

        Ok(Self {
            host: std::env::var("SFTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("SFTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2222),
            username,
            password,
            host_key_path: std::env::var("SFTP_HOST_KEY_PATH").ok().map(PathBuf::from),
            raw_bucket: std::env::var("RAW_CLIPS_BUCKET")
                .unwrap_or_else(|_| "raw-clips".to_string()),
        })
    }
}
