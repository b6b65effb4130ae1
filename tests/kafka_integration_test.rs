mod common;

use common::{test_brokers, test_topic};
use kafka_destination::step::{Connector, StepConfig, StepKind};
use kafka_destination::Record;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::message::Headers;
use rdkafka::Message;
use std::time::{Duration, Instant};

#[test]
#[ignore] // Requires running Kafka
fn test_publish_to_kafka() {
    tracing_subscriber::fmt()
        .with_env_filter("kafka_destination=debug")
        .try_init()
        .ok();

    let topic = test_topic("publish");
    let connector = Connector::default();
    connector
        .configure(StepConfig::new(StepKind::Destination, 1))
        .unwrap();
    connector.set_param(1, "driver.bootstrap_servers", test_brokers());
    connector.set_param(1, "driver.allow_auto_create_topics", "true");
    connector.start(1).unwrap();

    let record = Record::new("hello")
        .with_metadata("kafka.topic", topic.as_str())
        .with_metadata("kafka.key", "k")
        .with_metadata("kafka.headers.source", "integration-test");
    connector.process_record(&record, 1).unwrap();

    let stats = connector.shutdown(1).unwrap();
    assert_eq!(stats.submitted, 1);
    assert_eq!(stats.delivered, 1);

    let consumer: BaseConsumer = ClientConfig::new()
        .set("bootstrap.servers", test_brokers())
        .set("group.id", format!("{}_group", topic))
        .set("auto.offset.reset", "earliest")
        .create()
        .unwrap();
    consumer.subscribe(&[topic.as_str()]).unwrap();

    let deadline = Instant::now() + Duration::from_secs(30);
    while Instant::now() < deadline {
        let Some(result) = consumer.poll(Duration::from_millis(500)) else {
            continue;
        };
        let message = result.unwrap();
        assert_eq!(message.payload(), Some(&b"hello"[..]));
        assert_eq!(message.key(), Some(&b"k"[..]));

        let headers = message.headers().unwrap();
        let header = headers.get(0);
        assert_eq!(header.key, "source");
        assert_eq!(header.value, Some(&b"integration-test"[..]));
        return;
    }
    panic!("message was not consumed within 30 seconds");
}

#[test]
#[ignore] // Requires running Kafka
fn test_unreachable_broker_reports_delivery_failure() {
    let connector = Connector::default();
    connector
        .configure(StepConfig::new(StepKind::Destination, 2))
        .unwrap();
    connector.set_param(2, "driver.bootstrap_servers", "localhost:1");
    connector.set_param(2, "driver.message_timeout_ms", "500");
    connector.set_param(2, "flush_timeout_ms", "2000");
    connector.start(2).unwrap();

    // Enqueueing succeeds even though the broker is unreachable
    connector
        .process_record(&Record::new("x").with_metadata("kafka.topic", "t"), 2)
        .unwrap();

    let stats = connector.shutdown(2).unwrap();
    assert_eq!(stats.submitted, 1);
    assert_eq!(stats.delivered, 0);
    assert_eq!(stats.delivery_failed, 1);
}
