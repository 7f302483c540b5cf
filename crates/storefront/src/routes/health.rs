//! Liveness and readiness probes.

use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
}

/// Liveness health check. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
