//! The claim/transform/finalize pipeline.
//!
//! Notifications arrive at least once and several orchestrator instances
//! may receive the same one; the atomic claim in the registry is the only
//! thing that keeps a clip from being processed twice. Everything after a
//! won claim either ends in `READY`, ends in `FAILED`, or leaves the row
//! stuck in `PROCESSING` for the reconciliation sweep to reset.

use metrics::counter;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use clipflow_models::{keys, ClipRecord};

use crate::error::{ProcessError, ProcessResult};
use crate::state::AppState;

/// How one notification ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Another instance holds (or held) the claim; nothing was done.
    ClaimMiss,
    /// Processed artifact uploaded and the record finalized as READY.
    Ready { processed_url: String },
    /// Processing failed and the record was finalized as FAILED.
    Failed,
    /// Processing failed and the failure-finalize failed too; the record
    /// remains PROCESSING until the reconciliation sweep resets it.
    StuckProcessing,
}

/// Drive one clip from a change notification to a terminal status.
///
/// Errors are only returned when the claim itself could not be attempted;
/// the record is still `PENDING` then and a redelivery will retry it.
pub async fn process_clip(state: &AppState, record: &ClipRecord) -> ProcessResult<PipelineOutcome> {
    let id = &record.id;

    let claimed = match state.registry.claim(id).await? {
        Some(claimed) => claimed,
        None => {
            // At-least-once delivery at work; someone else won.
            debug!(clip_id = %id, "Claim miss, nothing to do");
            return Ok(PipelineOutcome::ClaimMiss);
        }
    };

    info!(clip_id = %id, filename = %claimed.filename, "Claimed clip, processing");

    match transform_and_upload(state, &claimed).await {
        Ok(processed_url) => match state.registry.mark_ready(id, &processed_url).await {
            Ok(()) => {
                counter!("processor_clips_ready_total").increment(1);
                info!(clip_id = %id, processed_url = %processed_url, "Clip READY");
                Ok(PipelineOutcome::Ready { processed_url })
            }
            Err(e) => {
                error!(clip_id = %id, error = %e, "READY finalize failed");
                Ok(finalize_failed(state, &claimed).await)
            }
        },
        Err(e) => {
            warn!(clip_id = %id, error = %e, "Processing failed");
            Ok(finalize_failed(state, &claimed).await)
        }
    }
}

/// Steps 1-3 of the pipeline once the claim is won: fetch the raw bytes,
/// run the opaque transformation under its timeout, upload the result.
async fn transform_and_upload(state: &AppState, clip: &ClipRecord) -> ProcessResult<String> {
    let config = &state.config;

    let raw_key = keys::raw_key(&clip.uploader_id, &clip.filename);
    let raw = state
        .store
        .download_bytes(&config.raw_bucket, &raw_key)
        .await?;
    debug!(clip_id = %clip.id, bytes = raw.len(), "Downloaded raw clip");

    let processed = timeout(config.transform_timeout, state.transformer.transform(raw))
        .await
        .map_err(|_| ProcessError::TransformTimeout(config.transform_timeout))??;

    // Deterministic key: a retried notification overwrites the same object.
    let processed_key = keys::processed_key(&clip.uploader_id, &clip.filename);
    let processed_url = state
        .store
        .upload_bytes(
            &config.processed_bucket,
            &processed_key,
            processed,
            "video/mp4",
        )
        .await?;

    Ok(processed_url)
}

/// Best-effort `FAILED` finalize. If the update itself fails, the record
/// is left `PROCESSING` and handed to the reconciliation sweep.
async fn finalize_failed(state: &AppState, clip: &ClipRecord) -> PipelineOutcome {
    match state.registry.mark_failed(&clip.id).await {
        Ok(()) => {
            counter!("processor_clips_failed_total").increment(1);
            PipelineOutcome::Failed
        }
        Err(e) => {
            counter!("processor_clips_stuck_total").increment(1);
            error!(
                clip_id = %clip.id,
                error = %e,
                "FAILED finalize also failed; record left PROCESSING for reconciliation"
            );
            PipelineOutcome::StuckProcessing
        }
    }
}
