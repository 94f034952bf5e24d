use std::sync::Arc;

use order_store::OrderStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<OrderStore>,
}
