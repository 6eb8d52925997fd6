//! Route configuration for the control API.

use super::handlers::*;
use super::state::ControlState;
use axum::{
    routing::{get, post},
    Router,
};

/// Create the router with all control routes.
pub fn create_router(state: ControlState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/control", post(control_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{ControlHandle, ControlMessage};
    use axum::{body::Body, http::Request, http::StatusCode};
    use snapline_messages::{ControlCommand, ControlReply, SnapshotReport};
    use snapline_types::NodeId;
    use std::collections::BTreeMap;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    /// A control handle answered by a task that reports fixed balances.
    fn answering_state() -> ControlState {
        let (tx, mut rx) = mpsc::channel::<ControlMessage>(8);
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                assert_eq!(message.command, ControlCommand::Snapshot);
                let nodes = BTreeMap::from([(NodeId(1), 4_970_000), (NodeId(2), 5_030_000)]);
                let _ = message.reply.send(ControlReply {
                    snapshot: SnapshotReport { nodes },
                });
            }
        });
        ControlState::new(NodeId(1), ControlHandle::from_sender(tx))
    }

    /// A control handle whose runner has already stopped.
    fn stopped_state() -> ControlState {
        let (tx, rx) = mpsc::channel::<ControlMessage>(1);
        drop(rx);
        ControlState::new(NodeId(1), ControlHandle::from_sender(tx))
    }

    fn control_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/control")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_router_health() {
        let app = create_router(answering_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["node"], 1);
    }

    #[tokio::test]
    async fn test_router_metrics() {
        crate::metrics::record_invalid_message();
        let app = create_router(answering_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.contains("snapline_invalid_messages_received_total"));
    }

    #[tokio::test]
    async fn test_router_snapshot() {
        let app = create_router(answering_state());

        let response = app
            .oneshot(control_request(r#"{"cmd":"snapshot"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(
            json,
            serde_json::json!({"snapshot": {"nodes": {"1": 4970000, "2": 5030000}}})
        );
    }

    #[tokio::test]
    async fn test_router_rejects_unknown_command() {
        let app = create_router(answering_state());

        let response = app
            .oneshot(control_request(r#"{"cmd":"restart"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("restart"));
    }

    #[tokio::test]
    async fn test_router_rejects_malformed_body() {
        let app = create_router(answering_state());

        let response = app.oneshot(control_request("{cmd")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_router_runner_gone() {
        let app = create_router(stopped_state());

        let response = app
            .oneshot(control_request(r#"{"cmd":"snapshot"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
