//! Records handed to the connector by the pipeline host.

use std::collections::HashMap;

/// A single name/value metadata pair attached to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub name: String,
    pub value: String,
}

impl MetadataEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A single piece of data to publish: payload bytes plus metadata.
///
/// Metadata order carries no meaning for lookups, but when a name repeats
/// the last occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub payload: Vec<u8>,
    pub metadata: Vec<MetadataEntry>,
}

impl Record {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            metadata: Vec::new(),
        }
    }

    /// Appends a metadata pair.
    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push(MetadataEntry::new(name, value));
        self
    }

    /// Flattens the metadata pairs into a lookup map, last write wins.
    pub fn metadata_map(&self) -> HashMap<&str, &str> {
        self.metadata
            .iter()
            .map(|entry| (entry.name.as_str(), entry.value.as_str()))
            .collect()
    }
}
