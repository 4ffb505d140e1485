//! REST API handlers.
//!
//! Each handler takes a snapshot of the lifecycle and returns it as JSON
//! or Prometheus text. Nothing here can move the lifecycle.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use warpgrid_lifecycle::{render_prometheus, transition_graph, LifecycleState};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct LifecycleStatus {
    pub state: LifecycleState,
    pub registered: bool,
}

#[derive(Debug, Serialize)]
pub struct TransitionView {
    pub from: LifecycleState,
    pub to: LifecycleState,
    /// Whether entering `to` along this edge runs work.
    pub has_action: bool,
}

// ── Lifecycle ──────────────────────────────────────────────────

/// GET /api/v1/lifecycle
pub async fn lifecycle_status(State(state): State<ApiState>) -> impl IntoResponse {
    let gauges = state.lifecycle.gauges();
    ApiResponse::ok(LifecycleStatus {
        state: gauges.state,
        registered: gauges.framework_registered,
    })
}

/// GET /api/v1/lifecycle/transitions
pub async fn lifecycle_transitions() -> impl IntoResponse {
    let edges: Vec<TransitionView> = transition_graph()
        .into_iter()
        .map(|t| TransitionView {
            from: t.from,
            to: t.to,
            has_action: t.action.is_some(),
        })
        .collect();
    ApiResponse::ok(edges)
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = render_prometheus(&state.lifecycle.gauges().gauges());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::to_bytes;
    use warpgrid_lifecycle::testing::{
        CountingShutdown, FakeDriverFactory, ManualDelayedActions, MemStorage, RecordingEventSink,
    };
    use warpgrid_lifecycle::{Collaborators, SchedulerLifecycle};

    use super::*;

    fn test_state() -> ApiState {
        let lifecycle = SchedulerLifecycle::with_delayed_actions(
            Collaborators {
                storage: Arc::new(MemStorage::new()),
                driver_factory: Arc::new(FakeDriverFactory::default()),
                events: Arc::new(RecordingEventSink::default()),
                shutdown: Arc::new(CountingShutdown::default()),
            },
            Arc::new(ManualDelayedActions::default()),
        );
        ApiState { lifecycle }
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn lifecycle_status_reports_idle() {
        let state = test_state();
        let resp = lifecycle_status(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["data"]["state"], "IDLE");
        assert_eq!(json["data"]["registered"], false);
    }

    #[tokio::test]
    async fn lifecycle_status_follows_prepare() {
        let state = test_state();
        state.lifecycle.prepare().unwrap();

        let resp = lifecycle_status(State(state)).await.into_response();
        let json = body_json(resp).await;
        assert_eq!(json["data"]["state"], "STORAGE_PREPARED");
    }

    #[tokio::test]
    async fn transitions_list_every_edge() {
        let resp = lifecycle_transitions().await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        let edges = json["data"].as_array().unwrap();
        assert_eq!(edges.len(), transition_graph().len());
        assert!(edges
            .iter()
            .any(|e| e["from"] == "IDLE" && e["to"] == "PREPARING_STORAGE" && e["has_action"] == true));
    }

    #[tokio::test]
    async fn prometheus_endpoint_returns_text() {
        let state = test_state();
        let resp = prometheus_metrics(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.contains("text/plain"));

        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("warpgrid_scheduler_lifecycle_IDLE 1"));
        assert!(body.contains("warpgrid_framework_registered 0"));
    }

    #[tokio::test]
    async fn router_serves_lifecycle() {
        use tower::ServiceExt;

        let router = crate::build_router(test_state().lifecycle);
        let resp = router
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/v1/lifecycle")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
