//! Kafka destination connector for record pipelines.
//!
//! The host pipeline loads this crate as a dynamic library and drives one
//! [`step::Connector`] through the C ABI in [`ffi`]. Each record's metadata
//! selects the topic (`kafka.topic`), the optional key (`kafka.key`) and the
//! headers (`kafka.headers.<name>`); parameters prefixed with `driver.` are
//! passed on to the Kafka client.
//!
//! - [`config`] - driver parameter filtering and connector options
//! - [`kafka`] - message mapping, broker client and producer engine
//! - [`step`] - step lifecycle and registry
//! - [`ffi`] - the plugin boundary

pub mod config;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod record;
pub mod step;

/// In-memory broker client for tests.
///
/// This module is only available when compiling tests or when the `testing` feature is enabled.
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub mod kafka;

pub use error::{ConfigureError, Error, Result};
pub use record::{MetadataEntry, Record};
pub use step::{Connector, ModuleHandle, StepConfig, StepKind};
