//! HTTP API route definitions.

use axum::{routing::get, Router};

use super::handlers::{health, prometheus, ready, status, AppState};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Status endpoint
        .route("/api/v1/status", get(status))
        // Prometheus exposition
        .route("/metrics", get(prometheus))
        .with_state(state)
}
