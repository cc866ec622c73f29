//! Webhook and health handlers.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use clipflow_models::ChangeEvent;

use crate::pipeline;
use crate::state::AppState;

/// Header carrying the shared secret from the change-capture sender.
pub const SECRET_HEADER: &str = "x-webhook-secret";

/// Change-notification endpoint.
///
/// The sender is acknowledged with `202` as soon as the event is accepted;
/// processing runs detached and its outcome is only visible through the
/// registry's status field. The body is taken as a raw string so the
/// secret check happens before any parsing.
pub async fn new_clip(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let presented = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if presented != Some(state.config.webhook_secret.as_str()) {
        counter!("processor_webhook_unauthorized_total").increment(1);
        warn!("Webhook rejected: invalid or missing secret");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized: invalid secret" })),
        )
            .into_response();
    }

    let event: ChangeEvent = match serde_json::from_str(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Webhook rejected: malformed payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Malformed event payload: {}", e) })),
            )
                .into_response();
        }
    };

    if !event.is_insert_into(&state.config.table) {
        debug!(kind = %event.event.kind, table = %event.table, "Ignoring event");
        return (
            StatusCode::OK,
            Json(json!({ "message": "Event type ignored" })),
        )
            .into_response();
    }

    let record = match event.clip_record() {
        Ok(record) => record,
        Err(e) => {
            warn!(error = %e, "Webhook rejected: record is not a clip");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Malformed clip record: {}", e) })),
            )
                .into_response();
        }
    };

    let clip_id = record.id.clone();
    info!(clip_id = %clip_id, "Accepted insertion event");

    // Acknowledge before processing; redelivery is handled by the claim.
    tokio::spawn(async move {
        if let Err(e) = pipeline::process_clip(&state, &record).await {
            error!(clip_id = %record.id, error = %e, "Pipeline error before claim resolution");
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({ "message": format!("Processing started for clip {}", clip_id) })),
    )
        .into_response()
}

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
