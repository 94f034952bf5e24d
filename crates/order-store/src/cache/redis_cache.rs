use async_trait::async_trait;
use common::metrics;
use domain::Order;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use tracing::{error, info, warn};

use super::OrderCache;
use crate::StoreError;

const KEY_PREFIX: &str = "order:";

/// Redis-backed cache for order aggregates.
///
/// Every `set` refreshes a fixed TTL; reads never extend it. Keys are
/// namespaced under `order:` so that `size` counts orders alone even when
/// the Redis database is shared with other data.
pub struct RedisCache {
    conn: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisCache {
    pub async fn new(redis_url: &str, ttl_seconds: u64) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Cache(format!("failed to create Redis client: {}", e)))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Cache(format!("failed to connect to Redis: {}", e)))?;

        info!("Redis cache initialized with TTL: {} seconds", ttl_seconds);
        Ok(Self { conn, ttl_seconds })
    }

    fn key(order_uid: &str) -> String {
        format!("{}{}", KEY_PREFIX, order_uid)
    }
}

#[async_trait]
impl OrderCache for RedisCache {
    async fn set(&self, order: &Order) {
        let key = Self::key(&order.order_uid);

        let json = match serde_json::to_string(order) {
            Ok(json) => json,
            Err(e) => {
                error!(
                    "failed to serialize order {} for cache: {}",
                    order.order_uid, e
                );
                return;
            }
        };

        let result: Result<(), RedisError> =
            self.conn.clone().set_ex(&key, json, self.ttl_seconds).await;

        if let Err(e) = result {
            error!("failed to cache order {}: {}", order.order_uid, e);
        }
    }

    async fn get(&self, order_uid: &str) -> Option<Order> {
        let key = Self::key(order_uid);

        let value: Result<Option<String>, RedisError> = self.conn.clone().get(&key).await;

        let order = match value {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(order) => Some(order),
                Err(e) => {
                    error!("failed to deserialize cached order {}: {}", order_uid, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Redis error for order {}: {}", order_uid, e);
                None
            }
        };

        metrics::record_cache_request("redis", order.is_some());
        order
    }

    async fn size(&self) -> usize {
        let mut conn = self.conn.clone();

        let mut keys = match conn.scan_match::<_, String>(format!("{}*", KEY_PREFIX)).await {
            Ok(iter) => iter,
            Err(e) => {
                error!("failed to scan Redis keyspace: {}", e);
                return 0;
            }
        };

        let mut count = 0;
        while keys.next_item().await.is_some() {
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::test_support::sample_order;

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_set_get_round_trip() {
        let cache = RedisCache::new("redis://localhost:6379", 300)
            .await
            .expect("Failed to connect to Redis");

        let order = sample_order("redis-test-uid");
        cache.set(&order).await;

        let cached = cache.get("redis-test-uid").await;
        assert_eq!(cached, Some(order));
    }

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_get_missing_returns_none() {
        let cache = RedisCache::new("redis://localhost:6379", 300)
            .await
            .expect("Failed to connect to Redis");

        assert!(cache.get("redis-missing-uid").await.is_none());
    }

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_size_counts_only_order_keys() {
        let cache = RedisCache::new("redis://localhost:6379", 300)
            .await
            .expect("Failed to connect to Redis");

        cache.set(&sample_order("redis-size-uid")).await;

        // An unrelated key in the same database must not be counted.
        let _: Result<(), RedisError> = cache
            .conn
            .clone()
            .set_ex("unrelated:key", "value", 300)
            .await;

        assert!(cache.size().await >= 1);
    }
}
