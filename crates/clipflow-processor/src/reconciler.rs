//! Background sweep for clips stuck in `PROCESSING`.
//!
//! A crash between claim and finalize leaves a row `PROCESSING` forever;
//! the same happens when the failure-finalize itself fails. This sweep
//! periodically resets rows that have sat in `PROCESSING` past the
//! configured timeout back to `PENDING`, where the next notification or
//! manual re-trigger can claim them again.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::time::interval;
use tracing::{error, info};

use clipflow_models::ClipId;
use clipflow_registry::ClipRegistry;

use crate::error::ProcessResult;

/// Periodic stale-`PROCESSING` reset.
pub struct Reconciler {
    registry: Arc<dyn ClipRegistry>,
    sweep_interval: Duration,
    processing_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        registry: Arc<dyn ClipRegistry>,
        sweep_interval: Duration,
        processing_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            sweep_interval,
            processing_timeout,
        }
    }

    /// Run indefinitely; spawn as a background task.
    pub async fn run(&self) {
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            timeout_secs = self.processing_timeout.as_secs(),
            "Starting reconciliation sweep"
        );

        let mut ticker = interval(self.sweep_interval);

        loop {
            ticker.tick().await;

            if let Err(e) = self.sweep_once().await {
                error!(error = %e, "Reconciliation sweep failed");
            }
        }
    }

    /// Run a single sweep, returning the ids that were reset.
    pub async fn sweep_once(&self) -> ProcessResult<Vec<ClipId>> {
        let reset = self.registry.reset_stale(self.processing_timeout).await?;

        if !reset.is_empty() {
            counter!("processor_reconciled_total").increment(reset.len() as u64);
            info!(count = reset.len(), "Reset stuck PROCESSING clips to PENDING");
        }

        Ok(reset)
    }
}
