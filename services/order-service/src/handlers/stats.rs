use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::error;

use crate::state::AppState;

#[derive(Serialize)]
pub struct StatsResponse {
    pub db_count: i64,
    pub cache_size: usize,
}

/// Operational counters: persisted orders and cached orders
pub async fn stats_handler(
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, (StatusCode, String)> {
    let db_count = match state.store.count().await {
        Ok(count) => count,
        Err(e) => {
            error!("Failed to count orders: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to count orders: {}", e),
            ));
        }
    };

    let cache_size = state.store.cache_size().await;

    Ok(Json(StatsResponse {
        db_count,
        cache_size,
    }))
}
