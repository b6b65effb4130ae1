//! Step parameters: driver parameter filtering, client settings and
//! connector-level options.
//!
//! Parameters reach the connector as free-form string pairs through
//! `set_param`. Keys prefixed with `driver.` belong to the Kafka client;
//! everything else is a connector-level option, and unknown connector keys
//! are ignored.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

/// Prefix of parameters forwarded to the Kafka client.
pub const DRIVER_PARAM_PREFIX: &str = "driver.";

/// Selects the `driver.` parameters and strips the prefix from their keys.
///
/// Keys are not translated any further; see [`ClientSettings`].
pub fn filter_driver_params(params: &HashMap<String, String>) -> HashMap<String, String> {
    params
        .iter()
        .filter_map(|(k, v)| {
            k.strip_prefix(DRIVER_PARAM_PREFIX)
                .map(|stripped| (stripped.to_string(), v.clone()))
        })
        .collect()
}

/// Kafka client configuration in the client's native key dialect.
///
/// Driver parameters use underscores as word separators
/// (`bootstrap_servers`); the client expects dots (`bootstrap.servers`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSettings {
    entries: BTreeMap<String, String>,
}

impl ClientSettings {
    /// Translates filtered driver parameters, replacing `_` with `.` in keys.
    pub fn from_driver_params(driver_params: &HashMap<String, String>) -> Self {
        let entries = driver_params
            .iter()
            .map(|(k, v)| (k.replace('_', "."), v.clone()))
            .collect();
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Connector-level options taken from the non-driver parameters.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ConnectorOptions {
    /// Interval between two drains of the delivery report queue.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long `produce` keeps retrying while the client queue is full.
    /// Zero means the full queue is reported immediately.
    #[serde(default)]
    pub queue_full_timeout_ms: u64,
    /// Budget for flushing outstanding messages when the producer closes.
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            queue_full_timeout_ms: 0,
            flush_timeout_ms: default_flush_timeout_ms(),
        }
    }
}

impl ConnectorOptions {
    /// Reads the options from the full step parameter map.
    ///
    /// Driver parameters and unknown keys are ignored.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let fields: serde_json::Map<String, Value> = params
            .iter()
            .filter(|(k, _)| !k.starts_with(DRIVER_PARAM_PREFIX))
            .map(|(k, v)| {
                let value = v
                    .trim()
                    .parse::<u64>()
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::String(v.clone()));
                (k.clone(), value)
            })
            .collect();

        let options: Self = serde_json::from_value(Value::Object(fields))
            .map_err(|e| Error::Config(format!("Invalid connector parameter: {}", e)))?;

        if options.poll_interval_ms == 0 {
            return Err(Error::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        Ok(options)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn queue_full_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_full_timeout_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }
}

/// Loads step parameters from a JSON object of string values.
pub fn load_params_file<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let params = serde_json::from_str(&content)?;
    Ok(params)
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_flush_timeout_ms() -> u64 {
    5000
}
