pub mod client;
pub mod mapper;
pub mod producer;
pub mod stats;

pub use client::{BrokerClient, ClientFactory, RdKafkaClientFactory, SubmitError};
pub use mapper::KafkaMessage;
pub use producer::{EngineState, KafkaProducer};
pub use stats::{ProducerStats, StatsSnapshot};
