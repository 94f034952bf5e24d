use std::collections::HashMap;

use async_trait::async_trait;
use common::metrics;
use domain::Order;
use tokio::sync::RwLock;

use super::OrderCache;

/// Process-local cache backend. Entries never expire, and `size` is the
/// exact number of orders held.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Order>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderCache for MemoryCache {
    async fn set(&self, order: &Order) {
        let mut entries = self.entries.write().await;
        entries.insert(order.order_uid.clone(), order.clone());
    }

    async fn get(&self, order_uid: &str) -> Option<Order> {
        let found = self.entries.read().await.get(order_uid).cloned();
        metrics::record_cache_request("memory", found.is_some());
        found
    }

    async fn size(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::test_support::sample_order;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new();
        let order = sample_order("uid-1");

        cache.set(&order).await;

        let cached = cache.get("uid-1").await;
        assert_eq!(cached, Some(order));
        assert_eq!(cache.size().await, 1);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let cache = MemoryCache::new();
        assert!(cache.get("missing-uid").await.is_none());
        assert_eq!(cache.size().await, 0);
    }

    #[tokio::test]
    async fn test_set_overwrites_existing_entry() {
        let cache = MemoryCache::new();
        let mut order = sample_order("uid-1");

        cache.set(&order).await;
        order.locale = "ru".to_string();
        cache.set(&order).await;

        assert_eq!(cache.size().await, 1);
        let cached = cache.get("uid-1").await.unwrap();
        assert_eq!(cached.locale, "ru");
    }

    #[tokio::test]
    async fn test_concurrent_readers_and_writers() {
        let cache = Arc::new(MemoryCache::new());
        let mut handles = Vec::new();

        for i in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let uid = format!("uid-{}", i);
                let order = sample_order(&uid);
                cache.set(&order).await;
                assert!(cache.get(&uid).await.is_some());
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.size().await, 16);
    }
}
