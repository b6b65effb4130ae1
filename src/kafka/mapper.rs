//! Derives the Kafka message for a record from its metadata.
//!
//! Interpreted metadata keys:
//! - `kafka.topic` (required)
//! - `kafka.key` (optional, absent means the partitioner picks a partition)
//! - `kafka.headers.<name>` (zero or more)
//!
//! Any other key is ignored.

use crate::record::Record;
use crate::{Error, Result};
use std::collections::HashMap;

pub const TOPIC_KEY: &str = "kafka.topic";
pub const MESSAGE_KEY: &str = "kafka.key";
pub const HEADER_PREFIX: &str = "kafka.headers.";

/// A message ready for exactly one publish attempt.
///
/// The payload borrows from the record; the broker client copies it when
/// the message is enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaMessage<'a> {
    pub topic: String,
    pub key: Option<String>,
    pub headers: HashMap<String, String>,
    pub payload: &'a [u8],
}

impl<'a> KafkaMessage<'a> {
    /// Maps a record onto a message. Fails with [`Error::MissingTopic`] when
    /// the record has no `kafka.topic` entry.
    pub fn from_record(record: &'a Record) -> Result<Self> {
        let metadata = record.metadata_map();

        let topic = metadata
            .get(TOPIC_KEY)
            .map(|t| t.to_string())
            .ok_or(Error::MissingTopic)?;
        let key = metadata.get(MESSAGE_KEY).map(|k| k.to_string());
        let headers = metadata
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(HEADER_PREFIX)
                    .map(|name| (name.to_string(), v.to_string()))
            })
            .collect();

        Ok(Self {
            topic,
            key,
            headers,
            payload: &record.payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_and_headers() {
        let record = Record::new("hi")
            .with_metadata("kafka.topic", "t")
            .with_metadata("kafka.headers.a", "b")
            .with_metadata("kafka.headers.trace.id", "123");

        let message = KafkaMessage::from_record(&record).unwrap();
        assert_eq!(message.topic, "t");
        assert_eq!(message.key, None);
        assert_eq!(message.payload, b"hi");
        assert_eq!(message.headers.len(), 2);
        assert_eq!(message.headers.get("a").unwrap(), "b");
        assert_eq!(message.headers.get("trace.id").unwrap(), "123");
    }

    #[test]
    fn test_key_is_optional() {
        let record = Record::new("x")
            .with_metadata("kafka.topic", "orders")
            .with_metadata("kafka.key", "customer-42");

        let message = KafkaMessage::from_record(&record).unwrap();
        assert_eq!(message.key.as_deref(), Some("customer-42"));
        assert!(message.headers.is_empty());
    }

    #[test]
    fn test_missing_topic() {
        let record = Record::new("x")
            .with_metadata("kafka.key", "k")
            .with_metadata("kafka.headers.a", "b");

        let err = KafkaMessage::from_record(&record).unwrap_err();
        assert!(matches!(err, Error::MissingTopic));
    }

    #[test]
    fn test_duplicate_topic_last_wins() {
        let record = Record::new("x")
            .with_metadata("kafka.topic", "first")
            .with_metadata("kafka.topic", "second");

        let message = KafkaMessage::from_record(&record).unwrap();
        assert_eq!(message.topic, "second");
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let record = Record::new("x")
            .with_metadata("kafka.topic", "t")
            .with_metadata("kafka.partition", "3")
            .with_metadata("http.path", "/ingest")
            .with_metadata("kafka.headers", "no-dot-suffix");

        let message = KafkaMessage::from_record(&record).unwrap();
        assert!(message.headers.is_empty());
        assert_eq!(message.key, None);
    }

    #[test]
    fn test_empty_header_name_kept() {
        let record = Record::new("x")
            .with_metadata("kafka.topic", "t")
            .with_metadata("kafka.headers.", "v");

        let message = KafkaMessage::from_record(&record).unwrap();
        assert_eq!(message.headers.get("").unwrap(), "v");
    }
}
