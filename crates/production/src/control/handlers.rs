//! HTTP request handlers for the control API.

use super::state::ControlState;
use super::types::*;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use prometheus::{Encoder, TextEncoder};
use snapline_messages::{ControlCommand, ControlReply, ControlRequest};
use tracing::{info, warn};

/// Handler for `GET /health` - liveness probe.
pub async fn health_handler(State(state): State<ControlState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        node: state.node.0,
    })
}

/// Handler for `GET /metrics` - Prometheus metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = ?e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics".to_string(),
        )
            .into_response();
    }

    (
        [(
            axum::http::header::CONTENT_TYPE,
            encoder.format_type().to_string(),
        )],
        buffer,
    )
        .into_response()
}

/// Handler for `POST /control`.
///
/// The body is parsed here rather than through the `Json` extractor so that
/// bad requests are logged and answered with the same error shape as every
/// other failure.
pub async fn control_handler(State(state): State<ControlState>, body: Bytes) -> Response {
    let request: ControlRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejecting control request");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(format!("Invalid control request: {}", e))),
            )
                .into_response();
        }
    };

    let _guard = state.request_lock.lock().await;

    match request.cmd {
        ControlCommand::Snapshot => {
            info!(node = %state.node, "Snapshot requested");
            match state.control.snapshot().await {
                Ok(snapshot) => (StatusCode::OK, Json(ControlReply { snapshot })).into_response(),
                Err(e) => {
                    warn!(error = %e, "Snapshot request failed");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        Json(ErrorResponse::new(e.to_string())),
                    )
                        .into_response()
                }
            }
        }
    }
}
