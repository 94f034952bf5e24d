use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use common::metrics;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(metrics) => (StatusCode::OK, metrics),
        Err(e) => {
            tracing::error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("Failed to gather metrics"),
            )
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(metrics_handler))

        // Order lookups
        .route("/api/v1/orders/:order_uid", get(handlers::get_order::get_order_handler))
        .route("/api/v1/stats", get(handlers::stats::stats_handler))

        // Middleware
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
