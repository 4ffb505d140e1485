//! warpgrid-api — HTTP API for the WarpGrid scheduler.
//!
//! Read-only views of the scheduler lifecycle for operators and scrapers.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/lifecycle` | Current state and registration flag |
//! | GET | `/api/v1/lifecycle/transitions` | Legal lifecycle transitions |
//! | GET | `/metrics` | Prometheus exposition |

pub mod handlers;

use axum::Router;
use axum::routing::get;
use warpgrid_lifecycle::SchedulerLifecycle;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub lifecycle: SchedulerLifecycle,
}

/// Build the complete API router (REST + metrics).
pub fn build_router(lifecycle: SchedulerLifecycle) -> Router {
    let api_state = ApiState { lifecycle };

    let api_routes = Router::new()
        .route("/lifecycle", get(handlers::lifecycle_status))
        .route("/lifecycle/transitions", get(handlers::lifecycle_transitions))
        .with_state(api_state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(api_state))
}
