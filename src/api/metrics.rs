//! Operational endpoints
//!
//! Liveness check and Prometheus metrics.

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};

use crate::AppState;
use crate::error::AppError;
use crate::metrics::{REGISTRY, USERS_TOTAL};

/// Metrics endpoint handler
///
/// Refreshes the gauges that mirror database counts, then returns all
/// metrics in Prometheus text format.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.db.count_users().await {
        Ok(count) => USERS_TOTAL.set(count),
        Err(error) => tracing::warn!(%error, "Failed to refresh user count"),
    }

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            metrics_text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

/// GET /health
///
/// Answers only once the database is reachable.
async fn health_check(State(state): State<AppState>) -> Result<&'static str, AppError> {
    state.db.count_users().await?;
    Ok("OK")
}

/// Create router for `/health` and `/metrics`
pub fn metrics_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
}
