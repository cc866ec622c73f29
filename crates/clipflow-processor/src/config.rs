//! Processing orchestrator configuration.

use std::time::Duration;

use crate::error::{ProcessError, ProcessResult};

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Webhook bind port
    pub port: u16,
    /// Shared secret presented by the change-capture sender
    pub webhook_secret: String,
    /// Registry table notifications must target to be acted on
    pub table: String,
    /// Bucket holding raw uploads
    pub raw_bucket: String,
    /// Bucket receiving processed artifacts
    pub processed_bucket: String,
    /// External transform command; passthrough when unset
    pub transform_command: Option<String>,
    /// Upper bound on a single transformation
    pub transform_timeout: Duration,
    /// Whether the stale-PROCESSING reconciliation sweep runs
    pub reconcile_enabled: bool,
    /// Interval between reconciliation sweeps
    pub reconcile_interval: Duration,
    /// Age after which a PROCESSING record counts as stuck
    pub processing_timeout: Duration,
    /// Request body size limit for the webhook
    pub max_body_size: usize,
}

fn env_duration_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default),
    )
}

impl ProcessorConfig {
    /// Create config from environment variables.
    ///
    /// `WEBHOOK_SECRET` is required; everything else has a default.
    pub fn from_env() -> ProcessResult<Self> {
        let webhook_secret = std::env::var("WEBHOOK_SECRET")
            .map_err(|_| ProcessError::config_error("WEBHOOK_SECRET not set"))?;
        if webhook_secret.is_empty() {
            return Err(ProcessError::config_error("WEBHOOK_SECRET cannot be empty"));
        }

        Ok(Self {
            port: std::env::var("PROCESSOR_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3001),
            webhook_secret,
            table: std::env::var("REGISTRY_TABLE").unwrap_or_else(|_| "clips".to_string()),
            raw_bucket: std::env::var("RAW_CLIPS_BUCKET")
                .unwrap_or_else(|_| "raw-clips".to_string()),
            processed_bucket: std::env::var("PROCESSED_CLIPS_BUCKET")
                .unwrap_or_else(|_| "processed-clips".to_string()),
            transform_command: std::env::var("TRANSFORM_COMMAND").ok().filter(|s| !s.is_empty()),
            transform_timeout: env_duration_secs("TRANSFORM_TIMEOUT_SECS", 300),
            reconcile_enabled: std::env::var("ENABLE_RECONCILER")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            reconcile_interval: env_duration_secs("RECONCILE_INTERVAL_SECS", 60),
            processing_timeout: env_duration_secs("PROCESSING_TIMEOUT_SECS", 600),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024),
        })
    }
}
