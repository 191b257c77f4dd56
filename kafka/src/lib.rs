use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tracing::debug;

/// How long a send waits for broker acknowledgement before giving up.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection settings for building a producer/consumer pair.
///
/// The concrete librdkafka options mirror what the deployment expects:
/// auto-committed offsets on the consumer side and a single retry with a
/// short socket timeout on the producer side.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    brokers: String,
    group_id: String,
    auto_offset_reset: String,
}

impl KafkaConfig {
    /// Creates a new configuration.
    ///
    /// # Arguments
    /// * `brokers` - Comma-separated broker list (e.g. "localhost:9092")
    /// * `group_id` - Consumer group identifier
    pub fn new(brokers: &str, group_id: &str) -> Self {
        Self {
            brokers: brokers.to_owned(),
            group_id: group_id.to_owned(),
            auto_offset_reset: "latest".to_owned(),
        }
    }

    /// Overrides the `auto.offset.reset` policy ("latest" by default).
    pub fn with_auto_offset_reset(mut self, policy: &str) -> Self {
        self.auto_offset_reset = policy.to_owned();
        self
    }

    fn producer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("retries", "1")
            .set("socket.timeout.ms", "5000");
        config
    }

    fn consumer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", "10000")
            .set("heartbeat.interval.ms", "3000")
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("max.poll.interval.ms", "300000");
        config
    }
}

/// Error types for Kafka operations
#[derive(Debug, thiserror::Error)]
pub enum KafkaError {
    /// Error creating the underlying client
    #[error("Error while creating kafka client: {0}")]
    Client(rdkafka::error::KafkaError),
    /// Error subscribing to topics
    #[error("Error while subscribing to topics: {0}")]
    Subscribe(rdkafka::error::KafkaError),
    /// Error receiving a message.
    ///
    /// The underlying librdkafka text is passed through unchanged so that
    /// callers can classify transport faults from it.
    #[error("{0}")]
    Receive(rdkafka::error::KafkaError),
    /// Message delivery failed or timed out
    #[error("Error while delivering a message: {0}")]
    Delivery(rdkafka::error::KafkaError),
    /// A message arrived without a payload
    #[error("Received a message with an empty payload")]
    EmptyPayload,
}

/// Thin wrapper around a Kafka producer/consumer pair.
///
/// One adapter owns both halves of the broker connection: a `FutureProducer`
/// for publishing keyed messages and a `StreamConsumer` for the subscribe /
/// receive cycle. Offsets are committed automatically by the consumer,
/// independent of what the caller does with each message.
pub struct KafkaAdapter {
    producer: FutureProducer,
    consumer: StreamConsumer,
}

impl KafkaAdapter {
    /// Creates the producer and consumer from the given configuration.
    ///
    /// # Errors
    /// Returns `KafkaError::Client` if either client cannot be created.
    pub fn new(config: KafkaConfig) -> Result<Self, KafkaError> {
        let producer: FutureProducer = config
            .producer_config()
            .create()
            .map_err(KafkaError::Client)?;

        let consumer: StreamConsumer = config
            .consumer_config()
            .create()
            .map_err(KafkaError::Client)?;

        Ok(Self { producer, consumer })
    }

    /// Subscribes the consumer to the given topics.
    ///
    /// Must be called once, before the first `receive`; there is no dynamic
    /// re-subscription.
    ///
    /// # Errors
    /// Returns `KafkaError::Subscribe` if the subscription is rejected.
    pub fn subscribe(&self, topics: &[String]) -> Result<(), KafkaError> {
        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        self.consumer
            .subscribe(&topic_refs)
            .map_err(KafkaError::Subscribe)
    }

    /// Publishes one message and waits for delivery acknowledgement.
    ///
    /// # Arguments
    /// * `topic` - Destination topic
    /// * `key` - Partition key
    /// * `payload` - Message body bytes
    ///
    /// # Errors
    /// Returns `KafkaError::Delivery` if the broker rejects the message or
    /// the delivery timeout elapses.
    pub async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        let (partition, offset) = self
            .producer
            .send(record, Timeout::After(DELIVERY_TIMEOUT))
            .await
            .map_err(|(err, _message)| KafkaError::Delivery(err))?;

        debug!(
            "delivered message to topic {} partition {} offset {}",
            topic, partition, offset
        );

        Ok(())
    }

    /// Waits for the next message on any subscribed topic.
    ///
    /// # Returns
    /// The message payload and the topic it arrived on.
    ///
    /// # Errors
    /// Returns `KafkaError::Receive` on a consumer error and
    /// `KafkaError::EmptyPayload` if the message carries no body.
    pub async fn receive(&self) -> Result<(Vec<u8>, String), KafkaError> {
        let message = self.consumer.recv().await.map_err(KafkaError::Receive)?;

        let payload = message.payload().ok_or(KafkaError::EmptyPayload)?.to_vec();

        Ok((payload, message.topic().to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_config_carries_expected_settings() {
        let config = KafkaConfig::new("localhost:9092", "intake-group");
        let producer = config.producer_config();

        assert_eq!(producer.get("bootstrap.servers"), Some("localhost:9092"));
        assert_eq!(producer.get("retries"), Some("1"));
        assert_eq!(producer.get("socket.timeout.ms"), Some("5000"));
    }

    #[test]
    fn consumer_config_carries_expected_settings() {
        let config = KafkaConfig::new("broker-1:9092,broker-2:9092", "intake-group");
        let consumer = config.consumer_config();

        assert_eq!(
            consumer.get("bootstrap.servers"),
            Some("broker-1:9092,broker-2:9092")
        );
        assert_eq!(consumer.get("group.id"), Some("intake-group"));
        assert_eq!(consumer.get("auto.offset.reset"), Some("latest"));
        assert_eq!(consumer.get("enable.auto.commit"), Some("true"));
        assert_eq!(consumer.get("session.timeout.ms"), Some("10000"));
        assert_eq!(consumer.get("heartbeat.interval.ms"), Some("3000"));
        assert_eq!(consumer.get("auto.commit.interval.ms"), Some("5000"));
        assert_eq!(consumer.get("max.poll.interval.ms"), Some("300000"));
    }

    #[test]
    fn auto_offset_reset_is_configurable() {
        let config =
            KafkaConfig::new("localhost:9092", "intake-group").with_auto_offset_reset("earliest");

        assert_eq!(
            config.consumer_config().get("auto.offset.reset"),
            Some("earliest")
        );
    }

    #[test]
    fn error_display_passes_receive_text_through() {
        let inner = rdkafka::error::KafkaError::Subscription("events.default".to_owned());
        let err = KafkaError::Receive(inner);

        // Receive errors must surface the underlying text untouched so the
        // consume loop can match on it.
        assert!(err.to_string().contains("events.default"));
        assert!(!err.to_string().starts_with("Error while"));
    }

    #[test]
    fn empty_payload_display() {
        assert_eq!(
            KafkaError::EmptyPayload.to_string(),
            "Received a message with an empty payload"
        );
    }
}
