use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::Order;
use order_store::StoreError;
use tracing::{error, info};

use crate::state::AppState;

/// Get a single order aggregate by its uid
pub async fn get_order_handler(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> Result<Json<Order>, (StatusCode, String)> {
    info!("Fetching order: {}", order_uid);

    match state.store.get(&order_uid).await {
        Ok(order) => Ok(Json(order)),
        Err(StoreError::NotFound(uid)) => {
            info!("Order not found: {}", uid);
            Err((StatusCode::NOT_FOUND, format!("Order not found: {}", uid)))
        }
        Err(e) => {
            error!("Failed to fetch order {}: {}", order_uid, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to fetch order: {}", e),
            ))
        }
    }
}
