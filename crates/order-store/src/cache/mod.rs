mod memory;
mod redis_cache;

pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

use async_trait::async_trait;
use domain::Order;

/// Key-value store of fully persisted order aggregates.
///
/// The cache is a denormalized copy of durable state and never the only
/// writer of it, so every operation is best-effort: backends log their own
/// failures and report them as misses rather than surfacing errors.
#[async_trait]
pub trait OrderCache: Send + Sync {
    /// Store an aggregate under its `order_uid`.
    async fn set(&self, order: &Order);

    /// Look up an aggregate. Absence, expiry and backend failures all read
    /// as `None`.
    async fn get(&self, order_uid: &str) -> Option<Order>;

    /// Number of cached order entries.
    async fn size(&self) -> usize;
}
