//! The broker client capability used by the producer engine, and its
//! rdkafka implementation.

use crate::config::ClientSettings;
use crate::kafka::mapper::KafkaMessage;
use crate::kafka::stats::ProducerStats;
use crate::{Error, Result};
use rdkafka::client::ClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{BaseProducer, BaseRecord, DeliveryResult, Producer, ProducerContext};
use rdkafka::Message;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Synchronous outcome of handing one message to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The client's internal queue has no room left.
    QueueFull,
    /// Any other rejection, with the client's message.
    Rejected(String),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::QueueFull => write!(f, "Local: Queue full"),
            SubmitError::Rejected(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<KafkaError> for SubmitError {
    fn from(e: KafkaError) -> Self {
        match e {
            KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull) => SubmitError::QueueFull,
            other => SubmitError::Rejected(other.to_string()),
        }
    }
}

/// A broker client: accepts messages synchronously and reports delivery
/// outcomes through a queue drained by [`BrokerClient::poll`].
///
/// Implementations must copy the payload before `send` returns.
pub trait BrokerClient: Send + Sync {
    /// Enqueues one message for any partition of its topic.
    fn send(&self, message: &KafkaMessage<'_>) -> std::result::Result<(), SubmitError>;

    /// Serves the delivery report queue without blocking.
    fn poll(&self);

    /// Waits up to `timeout` for outstanding messages to be delivered.
    fn flush(&self, timeout: Duration) -> Result<()>;
}

/// Builds broker clients from translated client settings.
pub trait ClientFactory: Send + Sync {
    fn create(
        &self,
        settings: &ClientSettings,
        stats: Arc<ProducerStats>,
    ) -> Result<Box<dyn BrokerClient>>;
}

/// Producer context that turns delivery reports into counters and logs
/// errors raised by librdkafka.
pub struct DeliveryTracker {
    stats: Arc<ProducerStats>,
}

impl ClientContext for DeliveryTracker {
    fn error(&self, error: KafkaError, reason: &str) {
        error!(error = %error, "Kafka client error: {}", reason);
    }
}

impl ProducerContext for DeliveryTracker {
    type DeliveryOpaque = ();

    fn delivery(&self, delivery_result: &DeliveryResult<'_>, _delivery_opaque: Self::DeliveryOpaque) {
        match delivery_result {
            Ok(message) => {
                self.stats.record_delivered();
                debug!(
                    topic = message.topic(),
                    partition = message.partition(),
                    offset = message.offset(),
                    "Message delivered"
                );
            }
            Err((e, message)) => {
                self.stats.record_delivery_failed();
                warn!(topic = message.topic(), "Message delivery failed: {}", e);
            }
        }
    }
}

pub struct RdKafkaClient {
    producer: BaseProducer<DeliveryTracker>,
}

impl BrokerClient for RdKafkaClient {
    fn send(&self, message: &KafkaMessage<'_>) -> std::result::Result<(), SubmitError> {
        let mut headers = OwnedHeaders::new_with_capacity(message.headers.len());
        for (key, value) in &message.headers {
            headers = headers.insert(Header {
                key: key.as_str(),
                value: Some(value.as_str()),
            });
        }

        let mut record: BaseRecord<'_, str, [u8]> = BaseRecord::to(&message.topic)
            .payload(message.payload)
            .headers(headers);
        if let Some(key) = &message.key {
            record = record.key(key.as_str());
        }

        self.producer
            .send(record)
            .map_err(|(e, _)| SubmitError::from(e))
    }

    fn poll(&self) {
        self.producer.poll(Duration::ZERO);
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer.flush(timeout).map_err(Error::Kafka)
    }
}

/// Creates rdkafka `BaseProducer`s.
#[derive(Debug, Default, Clone, Copy)]
pub struct RdKafkaClientFactory;

impl ClientFactory for RdKafkaClientFactory {
    fn create(
        &self,
        settings: &ClientSettings,
        stats: Arc<ProducerStats>,
    ) -> Result<Box<dyn BrokerClient>> {
        info!(
            bootstrap_servers = settings.get("bootstrap.servers").unwrap_or("(not provided)"),
            "Creating Kafka producer"
        );

        let mut config = ClientConfig::new();
        for (key, value) in settings.iter() {
            debug!("Setting Kafka client parameter '{}'", key);
            config.set(key, value);
        }

        let producer: BaseProducer<DeliveryTracker> =
            config.create_with_context(DeliveryTracker { stats })?;

        Ok(Box::new(RdKafkaClient { producer }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_is_recognised() {
        let err = SubmitError::from(KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull));
        assert_eq!(err, SubmitError::QueueFull);
    }

    #[test]
    fn test_other_production_errors_are_rejections() {
        let err = SubmitError::from(KafkaError::MessageProduction(
            RDKafkaErrorCode::MessageSizeTooLarge,
        ));
        assert!(matches!(err, SubmitError::Rejected(_)));
    }

    #[test]
    fn test_invalid_setting_fails_creation() {
        let mut params = std::collections::HashMap::new();
        params.insert("definitely_not_a_setting".to_string(), "1".to_string());
        let settings = ClientSettings::from_driver_params(&params);

        let result = RdKafkaClientFactory.create(&settings, Arc::default());
        assert!(matches!(result, Err(Error::Kafka(_))));
    }

    #[test]
    #[ignore] // May fail if system has specific network configurations
    fn test_client_creation_without_broker() {
        let mut params = std::collections::HashMap::new();
        params.insert("bootstrap_servers".to_string(), "localhost:9092".to_string());
        let settings = ClientSettings::from_driver_params(&params);

        // Creation does not connect, so it succeeds even if Kafka is not running
        let client = RdKafkaClientFactory.create(&settings, Arc::default());
        assert!(client.is_ok());
    }
}
