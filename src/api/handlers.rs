//! HTTP API handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;

use crate::scan::ScanStats;
use crate::venue::registry::VenueRegistry;

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Whether the engine has finished startup and is scanning.
    pub ready: Arc<std::sync::atomic::AtomicBool>,
    /// Registered venues, immutable after startup.
    pub venues: Arc<VenueRegistry>,
    /// Scan loop running totals.
    pub stats: Arc<tokio::sync::RwLock<ScanStats>>,
    /// Renders the Prometheus exposition text.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(venues: Arc<VenueRegistry>, prometheus: Option<PrometheusHandle>) -> Self {
        Self {
            ready: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            venues,
            stats: Arc::new(tokio::sync::RwLock::new(ScanStats::default())),
            prometheus,
        }
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready
            .store(ready, std::sync::atomic::Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether the scan loop is running.
    pub ready: bool,
    /// Connected venues.
    pub venues: usize,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Connected venue ids.
    pub venues: Vec<String>,
    /// Scan totals.
    pub stats: ScanStats,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let response = ReadyResponse {
        ready: is_ready,
        venues: state.venues.len(),
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns engine status and scan statistics.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.stats.read().await.clone();
    let status = if state.is_ready() { "running" } else { "starting" };

    Json(StatusResponse {
        status,
        venues: state
            .venues
            .profiles()
            .iter()
            .map(|p| p.id.to_string())
            .collect(),
        stats,
    })
}

/// Prometheus exposition handler.
pub async fn prometheus(State(state): State<AppState>) -> impl IntoResponse {
    match state.prometheus {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}
