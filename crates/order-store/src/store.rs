use std::sync::Arc;
use std::time::Instant;

use common::metrics;
use domain::Order;
use tracing::{debug, info, warn};

use crate::cache::OrderCache;
use crate::repository::OrderRepository;
use crate::StoreError;

/// Cache-aside facade over the durable repository and the order cache.
///
/// Writes go to the repository first and the cache is only told about
/// aggregates that are durably persisted; reads prefer the cache and fall
/// back to the repository, backfilling on the way out. Cache failures never
/// fail a store operation.
pub struct OrderStore {
    repo: Arc<dyn OrderRepository>,
    cache: Arc<dyn OrderCache>,
}

impl OrderStore {
    pub fn new(repo: Arc<dyn OrderRepository>, cache: Arc<dyn OrderCache>) -> Self {
        Self { repo, cache }
    }

    /// Persist the aggregate, then mirror it into the cache best-effort.
    pub async fn save(&self, order: &Order) -> Result<(), StoreError> {
        let started = Instant::now();
        self.repo.save(order).await?;
        metrics::record_store_operation("save", started.elapsed().as_secs_f64());

        // The aggregate is already durable at this point; the cache write
        // only speeds up future reads.
        self.cache.set(order).await;
        Ok(())
    }

    /// Fetch an aggregate, reading through the cache.
    pub async fn get(&self, order_uid: &str) -> Result<Order, StoreError> {
        if let Some(order) = self.cache.get(order_uid).await {
            debug!("order {} served from cache", order_uid);
            return Ok(order);
        }

        let started = Instant::now();
        let order = self.repo.load(order_uid).await?;
        metrics::record_store_operation("load", started.elapsed().as_secs_f64());

        self.cache.set(&order).await;
        Ok(order)
    }

    /// Prime the cache with up to `limit` orders (0 = all) through the same
    /// read-through path as `get`. Individual failures are logged and
    /// skipped; only a failed enumeration fails the call. Returns the number
    /// of orders warmed.
    pub async fn warm_up(&self, limit: usize) -> Result<usize, StoreError> {
        let uids = self.repo.list_uids(limit).await?;

        let mut warmed = 0;
        for uid in &uids {
            match self.get(uid).await {
                Ok(_) => warmed += 1,
                Err(e) => warn!("failed to warm order {}: {}", uid, e),
            }
        }

        info!("cache warmed with {} of {} orders", warmed, uids.len());
        Ok(warmed)
    }

    /// Number of orders in durable storage.
    pub async fn count(&self) -> Result<i64, StoreError> {
        self.repo.count().await
    }

    /// Number of orders currently cached.
    pub async fn cache_size(&self) -> usize {
        self.cache.size().await
    }
}
