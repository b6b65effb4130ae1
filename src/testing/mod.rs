//! Test utilities for the Kafka destination connector.
//!
//! - [`MockClientFactory`] - builds in-memory broker clients and records
//!   what they were asked to do
//!
//! # Example
//!
//! ```rust
//! use kafka_destination::step::{Connector, StepConfig, StepKind};
//! use kafka_destination::testing::MockClientFactory;
//! use kafka_destination::Record;
//!
//! let factory = MockClientFactory::new();
//! let connector = Connector::new(factory.clone());
//!
//! connector.configure(StepConfig::new(StepKind::Destination, 1)).unwrap();
//! connector.start(1).unwrap();
//! connector
//!     .process_record(&Record::new("hi").with_metadata("kafka.topic", "t"), 1)
//!     .unwrap();
//!
//! assert_eq!(factory.sent().len(), 1);
//! ```

pub mod mock_client;

pub use mock_client::{MockClient, MockClientFactory, SentMessage};
