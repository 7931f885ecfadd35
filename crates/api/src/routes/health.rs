//! Health check and metrics endpoints.

use axum::{extract::State, http::StatusCode, Json};
use telemetry::{health, metrics, MetricsSnapshot};

use crate::response::HealthResponse;
use crate::state::AppState;

/// GET /health - Probes both backends and reports their state.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    state.refresh_health().await;

    Json(HealthResponse {
        store_connected: health().store.is_healthy(),
        doveadm_available: health().doveadm.is_healthy(),
        report: health().report(),
    })
}

/// GET /health/ready - Readiness probe (store reachable).
pub async fn ready_handler(State(state): State<AppState>) -> StatusCode {
    state.refresh_health().await;

    if health().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - Liveness probe (service is running).
pub async fn live_handler() -> StatusCode {
    if health().is_alive() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /metrics
pub async fn metrics_handler() -> Json<MetricsSnapshot> {
    Json(metrics().snapshot())
}
