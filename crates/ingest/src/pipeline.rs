use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::metrics;
use domain::Order;
use order_store::{OrderStore, StoreError};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::source::RecordSource;
use crate::validation::{OrderValidator, ValidationError, ValidationPolicy};

const POLL_TIMEOUT: Duration = Duration::from_millis(500);
const SOURCE_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("order {order_uid} rejected: {source}")]
    Validation {
        order_uid: String,
        #[source]
        source: ValidationError,
    },

    #[error("failed to persist order: {0}")]
    Store(#[from] StoreError),
}

/// Drives one logical stream partition: receive, decode, validate, persist.
///
/// Error policy per record: undecodable payloads are logged and skipped,
/// invalid aggregates stop the run or are skipped depending on the
/// configured policy, and persistence failures always stop the run. The
/// shutdown flag is observed between records; an in-flight record finishes
/// processing before the loop exits.
pub struct IngestPipeline {
    source: Box<dyn RecordSource>,
    store: Arc<OrderStore>,
    validator: Arc<dyn OrderValidator>,
    policy: ValidationPolicy,
    shutdown: Arc<AtomicBool>,
}

impl IngestPipeline {
    pub fn new(
        source: Box<dyn RecordSource>,
        store: Arc<OrderStore>,
        validator: Arc<dyn OrderValidator>,
        policy: ValidationPolicy,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            store,
            validator,
            policy,
            shutdown,
        }
    }

    /// Consume until cancellation or an unrecoverable error. The stream
    /// connection is released on every exit path.
    pub async fn run(mut self) -> Result<(), PipelineError> {
        info!("ingest pipeline started");

        let result = self.consume_loop().await;
        self.source.close();

        match &result {
            Ok(()) => info!("ingest pipeline stopped"),
            Err(e) => error!("ingest pipeline failed: {}", e),
        }
        result
    }

    async fn consume_loop(&mut self) -> Result<(), PipelineError> {
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("shutdown requested, stopping ingest pipeline");
                return Ok(());
            }

            match self.source.recv(POLL_TIMEOUT).await {
                Ok(Some(payload)) => self.process(&payload).await?,
                Ok(None) => {}
                Err(e) => {
                    // Broker hiccups are expected over a long run; back off
                    // and poll again rather than killing the worker.
                    warn!("record source error: {}, retrying", e);
                    tokio::time::sleep(SOURCE_RETRY_DELAY).await;
                }
            }
        }
    }

    async fn process(&self, payload: &[u8]) -> Result<(), PipelineError> {
        let order: Order = match serde_json::from_slice(payload) {
            Ok(order) => order,
            Err(e) => {
                warn!("skipping record that failed to decode: {}", e);
                metrics::record_ingest("decode_error");
                return Ok(());
            }
        };

        if let Err(e) = self.validator.validate(&order) {
            metrics::record_ingest("validation_error");
            match self.policy {
                ValidationPolicy::FailClosed => {
                    error!("order {} failed validation: {}", order.order_uid, e);
                    return Err(PipelineError::Validation {
                        order_uid: order.order_uid,
                        source: e,
                    });
                }
                ValidationPolicy::SkipInvalid => {
                    warn!("skipping invalid order {}: {}", order.order_uid, e);
                    return Ok(());
                }
            }
        }

        if let Err(e) = self.store.save(&order).await {
            error!("failed to persist order {}: {}", order.order_uid, e);
            metrics::record_ingest("store_error");
            return Err(PipelineError::Store(e));
        }

        metrics::record_ingest("persisted");
        info!("order {} ingested", order.order_uid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceError;
    use crate::validation::SchemaValidator;
    use async_trait::async_trait;
    use domain::test_support::sample_order;
    use order_store::{MemoryCache, OrderRepository};
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Yields queued records, then requests shutdown once drained so `run`
    /// returns.
    struct FakeSource {
        records: VecDeque<Vec<u8>>,
        shutdown: Arc<AtomicBool>,
    }

    impl FakeSource {
        fn new(records: Vec<Vec<u8>>, shutdown: Arc<AtomicBool>) -> Self {
            Self {
                records: records.into(),
                shutdown,
            }
        }
    }

    #[async_trait]
    impl RecordSource for FakeSource {
        async fn recv(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>, SourceError> {
            match self.records.pop_front() {
                Some(record) => Ok(Some(record)),
                None => {
                    self.shutdown.store(true, Ordering::Relaxed);
                    Ok(None)
                }
            }
        }
    }

    #[derive(Default)]
    struct FakeRepo {
        orders: Mutex<HashMap<String, Order>>,
        fail_saves: bool,
    }

    #[async_trait]
    impl OrderRepository for FakeRepo {
        async fn save(&self, order: &Order) -> Result<(), StoreError> {
            if self.fail_saves {
                return Err(StoreError::Database(sqlx::Error::RowNotFound));
            }
            self.orders
                .lock()
                .unwrap()
                .insert(order.order_uid.clone(), order.clone());
            Ok(())
        }

        async fn load(&self, order_uid: &str) -> Result<Order, StoreError> {
            self.orders
                .lock()
                .unwrap()
                .get(order_uid)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(order_uid.to_string()))
        }

        async fn count(&self) -> Result<i64, StoreError> {
            Ok(self.orders.lock().unwrap().len() as i64)
        }

        async fn list_uids(&self, limit: usize) -> Result<Vec<String>, StoreError> {
            let mut uids: Vec<String> = self.orders.lock().unwrap().keys().cloned().collect();
            uids.sort();
            if limit > 0 {
                uids.truncate(limit);
            }
            Ok(uids)
        }
    }

    fn pipeline_with(
        records: Vec<Vec<u8>>,
        repo: Arc<FakeRepo>,
        policy: ValidationPolicy,
    ) -> (IngestPipeline, Arc<AtomicBool>) {
        let shutdown = Arc::new(AtomicBool::new(false));
        let store = Arc::new(OrderStore::new(repo, Arc::new(MemoryCache::new())));
        let pipeline = IngestPipeline::new(
            Box::new(FakeSource::new(records, shutdown.clone())),
            store,
            Arc::new(SchemaValidator),
            policy,
            shutdown.clone(),
        );
        (pipeline, shutdown)
    }

    fn encode(order: &Order) -> Vec<u8> {
        serde_json::to_vec(order).unwrap()
    }

    #[tokio::test]
    async fn test_decode_error_skips_and_continues() {
        let repo = Arc::new(FakeRepo::default());
        let order = sample_order("uid-a");
        let (pipeline, _) = pipeline_with(
            vec![b"not-json".to_vec(), encode(&order)],
            repo.clone(),
            ValidationPolicy::FailClosed,
        );

        pipeline.run().await.unwrap();

        assert!(repo.orders.lock().unwrap().contains_key("uid-a"));
    }

    #[tokio::test]
    async fn test_fail_closed_stops_on_invalid_order() {
        let repo = Arc::new(FakeRepo::default());
        let mut invalid = sample_order("uid-bad");
        invalid.items.clear();

        let (pipeline, _) = pipeline_with(
            vec![encode(&invalid)],
            repo.clone(),
            ValidationPolicy::FailClosed,
        );

        let result = pipeline.run().await;

        assert!(matches!(
            result,
            Err(PipelineError::Validation { order_uid, .. }) if order_uid == "uid-bad"
        ));
        assert!(repo.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_skip_invalid_keeps_consuming() {
        let repo = Arc::new(FakeRepo::default());
        let mut invalid = sample_order("uid-bad");
        invalid.items.clear();
        let valid = sample_order("uid-good");

        let (pipeline, _) = pipeline_with(
            vec![encode(&invalid), encode(&valid)],
            repo.clone(),
            ValidationPolicy::SkipInvalid,
        );

        pipeline.run().await.unwrap();

        let orders = repo.orders.lock().unwrap();
        assert!(!orders.contains_key("uid-bad"));
        assert!(orders.contains_key("uid-good"));
    }

    #[tokio::test]
    async fn test_persist_failure_stops_run() {
        let repo = Arc::new(FakeRepo {
            fail_saves: true,
            ..Default::default()
        });
        let order = sample_order("uid-a");

        let (pipeline, _) = pipeline_with(
            vec![encode(&order)],
            repo.clone(),
            ValidationPolicy::FailClosed,
        );

        let result = pipeline.run().await;
        assert!(matches!(result, Err(PipelineError::Store(_))));
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_next_receive() {
        let repo = Arc::new(FakeRepo::default());
        let order = sample_order("uid-a");

        let (pipeline, shutdown) = pipeline_with(
            vec![encode(&order)],
            repo.clone(),
            ValidationPolicy::FailClosed,
        );
        shutdown.store(true, Ordering::Relaxed);

        pipeline.run().await.unwrap();

        // The flag was already set, so the queued record was never consumed.
        assert!(repo.orders.lock().unwrap().is_empty());
    }
}
