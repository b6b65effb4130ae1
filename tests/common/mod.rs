#![allow(dead_code)]

use kafka_destination::step::{Connector, ModuleHandle, StepConfig, StepKind};
use kafka_destination::testing::MockClientFactory;
use kafka_destination::Record;
use std::env;

/// Broker list for tests that need a running Kafka
pub fn test_brokers() -> String {
    env::var("TEST_KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string())
}

/// Unique topic name per test run
pub fn test_topic(name: &str) -> String {
    format!("test_{}_{}", name, std::process::id())
}

/// Connector backed by an in-memory client, with `handle` configured as a
/// destination and the given parameters set, but not started
pub fn configured_connector(
    handle: ModuleHandle,
    params: &[(&str, &str)],
) -> (Connector, MockClientFactory) {
    let factory = MockClientFactory::new();
    let connector = Connector::new(factory.clone());
    connector
        .configure(StepConfig::new(StepKind::Destination, handle))
        .unwrap();
    for (k, v) in params {
        connector.set_param(handle, *k, *v);
    }
    (connector, factory)
}

pub fn record_for(topic: &str, payload: &str) -> Record {
    Record::new(payload).with_metadata("kafka.topic", topic)
}
