//! Admin API handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;

use mdnswatch_metrics::render_prometheus;

use crate::ApiState;

/// GET /health
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET <metrics path>
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.metrics.snapshot().await;
    tracing::debug!(hosts = snapshot.hosts.len(), "metrics scraped");

    let body = render_prometheus(&snapshot);
    (
        StatusCode::OK,
        [(CONTENT_TYPE, mdnswatch_metrics::CONTENT_TYPE)],
        body,
    )
}
