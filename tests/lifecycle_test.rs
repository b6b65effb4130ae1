mod common;

use common::{configured_connector, record_for};
use kafka_destination::step::{Connector, StepConfig, StepKind, StepStatus};
use kafka_destination::testing::MockClientFactory;
use kafka_destination::{ConfigureError, Error, Record};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[test]
fn test_end_to_end_single_record() {
    let (connector, factory) = configured_connector(1, &[("driver.bootstrap_servers", "x")]);
    connector.start(1).unwrap();

    let record = Record::new("hi")
        .with_metadata("kafka.topic", "t")
        .with_metadata("kafka.headers.a", "b");
    connector.process_record(&record, 1).unwrap();

    let sent = factory.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].topic, "t");
    assert_eq!(sent[0].key, None);
    assert_eq!(sent[0].payload, b"hi".to_vec());
    assert_eq!(sent[0].headers.len(), 1);
    assert_eq!(sent[0].headers.get("a").unwrap(), "b");

    let settings = factory.last_settings().unwrap();
    assert_eq!(settings.get("bootstrap.servers"), Some("x"));
}

#[test]
fn test_driver_params_only_reach_client() {
    let (connector, factory) = configured_connector(
        1,
        &[
            ("driver.bootstrap_servers", "localhost:9092"),
            ("driver.queue_buffering_max_messages", "1000"),
            ("format", "%R"),
            ("flush_timeout_ms", "100"),
        ],
    );
    connector.start(1).unwrap();

    let settings = factory.last_settings().unwrap();
    let keys: Vec<&str> = settings.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["bootstrap.servers", "queue.buffering.max.messages"]);
    assert_eq!(settings.get("bootstrap.servers"), Some("localhost:9092"));
}

#[test]
fn test_key_and_duplicate_metadata() {
    let (connector, factory) = configured_connector(1, &[]);
    connector.start(1).unwrap();

    let record = Record::new("payload")
        .with_metadata("kafka.topic", "first")
        .with_metadata("kafka.key", "k1")
        .with_metadata("kafka.topic", "second")
        .with_metadata("kafka.headers.h", "1")
        .with_metadata("kafka.headers.h", "2");
    connector.process_record(&record, 1).unwrap();

    let sent = factory.sent();
    assert_eq!(sent[0].topic, "second");
    assert_eq!(sent[0].key.as_deref(), Some("k1"));
    assert_eq!(sent[0].headers.get("h").unwrap(), "2");
}

#[test]
fn test_failed_records_leave_step_started() {
    let (connector, factory) = configured_connector(1, &[]);
    connector.start(1).unwrap();

    let missing_topic = Record::new("x").with_metadata("kafka.key", "k");
    let err = connector.process_record(&missing_topic, 1).unwrap_err();
    assert_eq!(err.to_string(), "Missing the topic name in metadata");

    factory.set_queue_full(true);
    let err = connector.process_record(&record_for("t", "x"), 1).unwrap_err();
    assert!(matches!(err, Error::Submit(_)));

    factory.set_queue_full(false);
    connector.process_record(&record_for("t", "y"), 1).unwrap();

    assert_eq!(connector.status(1), StepStatus::Started);
    assert_eq!(factory.sent().len(), 1);

    let stats = connector.stats(1).unwrap();
    assert_eq!(stats.submitted, 1);
    assert_eq!(stats.rejected, 1);
}

#[test]
fn test_rejected_kind_leaves_no_state() {
    let factory = MockClientFactory::new();
    let connector = Connector::new(factory.clone());

    let result = connector.configure(StepConfig::new(StepKind::Transformation, 4));
    assert_eq!(result, Err(ConfigureError::KindNotSupported));

    connector.set_param(4, "driver.bootstrap_servers", "x");
    let err = connector.start(4).unwrap_err();
    assert!(err.to_string().contains("not found"));
    assert_eq!(factory.created(), 0);
}

#[test]
fn test_client_rejects_configuration() {
    let factory = MockClientFactory::new().reject_key("compression.codec");
    let connector = Connector::new(factory.clone());
    connector
        .configure(StepConfig::new(StepKind::Destination, 1))
        .unwrap();
    connector.set_param(1, "driver.compression_codec", "zip");

    let err = connector.start(1).unwrap_err();
    assert!(err.to_string().contains("compression.codec"));
    assert_eq!(connector.status(1), StepStatus::Configured);

    let err = connector.process_record(&record_for("t", "x"), 1).unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
}

#[test]
fn test_full_lifecycle_with_termination() {
    let factory = MockClientFactory::new();
    let connector = Connector::new(factory.clone());
    let terminated = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&terminated);
    connector
        .configure(
            StepConfig::new(StepKind::Destination, 11)
                .with_termination_handler(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .with_data_received_handler(|_, _| unreachable!("destination never emits")),
        )
        .unwrap();
    connector.set_param(11, "driver.bootstrap_servers", "x");
    connector.start(11).unwrap();

    for i in 0..10 {
        connector
            .process_record(&record_for("events", &i.to_string()), 11)
            .unwrap();
    }

    let stats = connector.shutdown(11).unwrap();
    assert_eq!(stats.submitted, 10);
    assert_eq!(stats.delivered, 10);
    assert_eq!(terminated.load(Ordering::SeqCst), 1);
    assert_eq!(factory.flushes(), 1);

    // Shutdown of a removed step is a no-op
    assert!(connector.shutdown(11).is_none());
    assert_eq!(terminated.load(Ordering::SeqCst), 1);

    // The handle can be configured again after shutdown
    connector
        .configure(StepConfig::new(StepKind::Destination, 11))
        .unwrap();
    assert_eq!(connector.status(11), StepStatus::Configured);
}
