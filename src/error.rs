//! Error types and result handling for kafka-destination.
//!
//! This module defines the main error type [`Error`], the [`ConfigureError`]
//! returned by the configure hook, and a convenience [`Result`] alias used
//! throughout the crate.
//!
//! The `Display` text of every error is what the host receives as the
//! diagnostic message, so messages are written to be logged verbatim.
//!
//! # Example
//!
//! ```rust
//! use kafka_destination::{Error, Result};
//!
//! fn require_topic(topic: Option<&str>) -> Result<&str> {
//!     topic.ok_or(Error::MissingTopic)
//! }
//!
//! match require_topic(None) {
//!     Ok(topic) => println!("Publishing to {}", topic),
//!     Err(Error::MissingTopic) => eprintln!("Record has no topic"),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use crate::step::ModuleHandle;
use thiserror::Error;

/// The main error type for connector operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Connector-level parameter could not be interpreted.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Kafka client rejected its configuration or could not be created.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// The record carries no `kafka.topic` metadata entry.
    #[error("Missing the topic name in metadata")]
    MissingTopic,

    /// The broker client refused to enqueue the message.
    #[error("Failed to send a message to Kafka: {0}")]
    Submit(String),

    /// No configuration was recorded for the handle.
    #[error("Init args for step '{0}' not found")]
    StepNotFound(ModuleHandle),

    /// The call is not valid in the step's current lifecycle state.
    #[error("Step '{handle}' is {state}: {message}")]
    InvalidState {
        /// Handle of the step
        handle: ModuleHandle,
        /// Name of the state the step is in
        state: &'static str,
        /// What was attempted
        message: String,
    },

    /// The producer engine was closed and accepts no more messages.
    #[error("Kafka producer is closed")]
    ProducerClosed,

    /// I/O error, typically from reading a params file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error when reading a params file or encoding stats.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure of the configure hook.
///
/// Each variant maps one-to-one onto a tag of the plugin boundary's
/// configure result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigureError {
    /// The step kind is not a destination.
    #[error("Only destination steps are supported")]
    KindNotSupported,

    /// Another step already uses the module. Carries the conflicting handle.
    #[error("Module is already used by step '{0}'")]
    MultipleStepsNotSupported(ModuleHandle),

    /// Any other configuration failure.
    #[error("{0}")]
    Misc(String),
}

/// A convenient Result type alias for connector operations.
///
/// This is equivalent to `std::result::Result<T, kafka_destination::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
