//! mdnswatch-api: administrative HTTP surface.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/health` | Liveness probe, always `200 OK` |
//! | GET | `/metrics` (configurable) | Prometheus exposition |

pub mod handlers;

use axum::Router;
use axum::routing::get;

use mdnswatch_metrics::MetricsRegistry;

/// Default path of the metrics endpoint.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub metrics: MetricsRegistry,
}

/// Build the admin router serving metrics at `metrics_path`.
pub fn build_router(metrics: MetricsRegistry, metrics_path: &str) -> Router {
    let state = ApiState { metrics };

    Router::new()
        .route("/health", get(handlers::health))
        .route(metrics_path, get(handlers::prometheus_metrics))
        .with_state(state)
}
