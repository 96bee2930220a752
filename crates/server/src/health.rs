//! Liveness/readiness/metrics handlers (§6 "Minimal HTTP surface carried by
//! the core"). Thin by design: each one calls into component J and returns
//! its result, nothing more.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::error;

use crate::state::AppState;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "openlabels-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match state.db.check_health().await {
        Ok(_) => true,
        Err(err) => {
            error!(error = %err, "database health check failed");
            false
        }
    };

    let status = if db_healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status,
        Json(json!({
            "ready": db_healthy,
            "checks": { "database": db_healthy },
        })),
    )
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [("content-type", "text/plain; version=0.0.4")],
        state.metrics.get_metrics(),
    )
}
