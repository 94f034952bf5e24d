pub mod cache;
pub mod repository;
pub mod store;

pub use cache::{MemoryCache, OrderCache, RedisCache};
pub use repository::{OrderRepository, PgOrderRepository};
pub use store::OrderStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("order {0} not found")]
    NotFound(String),

    #[error("integrity violation for order {order_uid}: {missing} record missing")]
    Integrity {
        order_uid: String,
        missing: &'static str,
    },
}
