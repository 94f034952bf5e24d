use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::message::Message;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

/// A reader of raw stream records.
///
/// `recv` blocks for at most `timeout` and returns `None` when no record
/// arrived, so the caller can check for cancellation between receives.
#[async_trait]
pub trait RecordSource: Send {
    async fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, SourceError>;

    /// Release the underlying stream resources. Called once when the
    /// pipeline run ends; must not panic if the run already failed.
    fn close(&mut self) {}
}

/// Kafka-backed record source for a single topic.
pub struct KafkaSource {
    consumer: BaseConsumer,
}

impl KafkaSource {
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self, SourceError> {
        info!(
            "creating Kafka consumer with group_id: {}, topic: {}",
            group_id, topic
        );

        let consumer: BaseConsumer = ClientConfig::new()
            .set("group.id", group_id)
            .set("bootstrap.servers", brokers)
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "10000")
            .create()?;

        consumer.subscribe(&[topic])?;

        info!("Kafka consumer created successfully");
        Ok(Self { consumer })
    }
}

#[async_trait]
impl RecordSource for KafkaSource {
    async fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, SourceError> {
        match self.consumer.poll(timeout) {
            Some(Ok(message)) => {
                debug!(
                    "received record from topic: {}, partition: {}, offset: {}",
                    message.topic(),
                    message.partition(),
                    message.offset()
                );

                match message.payload() {
                    Some(payload) => Ok(Some(payload.to_vec())),
                    None => {
                        warn!("record has no payload, skipping");
                        Ok(None)
                    }
                }
            }
            Some(Err(e)) => Err(SourceError::Kafka(e)),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.consumer.unsubscribe();
        info!("Kafka consumer closed");
    }
}
