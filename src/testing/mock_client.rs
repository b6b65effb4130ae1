//! In-memory broker client for testing.
//!
//! A lightweight stand-in for the Kafka client that:
//! - Records every message it accepts
//! - Rejects configured setting keys at creation time
//! - Simulates a full queue or periodic rejections on demand
//! - Counts polls and flushes

use crate::config::ClientSettings;
use crate::kafka::client::{BrokerClient, ClientFactory, SubmitError};
use crate::kafka::mapper::KafkaMessage;
use crate::kafka::stats::ProducerStats;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// A message accepted by a [`MockClient`], with the payload copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub topic: String,
    pub key: Option<String>,
    pub headers: HashMap<String, String>,
    pub payload: Vec<u8>,
}

#[derive(Default)]
struct MockState {
    sent: Mutex<Vec<SentMessage>>,
    settings: Mutex<Vec<ClientSettings>>,
    rejected_keys: Mutex<Vec<String>>,
    queue_full: AtomicBool,
    reject_every: AtomicU64,
    attempts: AtomicU64,
    pending: AtomicU64,
    polls: AtomicU64,
    flushes: AtomicU64,
    created: AtomicUsize,
}

/// Factory handing out [`MockClient`]s that share one recorded state.
///
/// Clones observe the same state, so a test can keep a clone while the
/// connector owns the original.
#[derive(Clone, Default)]
pub struct MockClientFactory {
    state: Arc<MockState>,
}

impl MockClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes client creation fail when the translated settings contain `key`.
    pub fn reject_key(self, key: impl Into<String>) -> Self {
        self.state
            .rejected_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key.into());
        self
    }

    /// While set, every submission fails with [`SubmitError::QueueFull`].
    pub fn set_queue_full(&self, full: bool) {
        self.state.queue_full.store(full, Ordering::SeqCst);
    }

    /// Rejects every `n`th submission attempt. Zero disables rejections.
    pub fn set_reject_every(&self, n: u64) {
        self.state.reject_every.store(n, Ordering::SeqCst);
    }

    /// Messages accepted so far, across all clients.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Settings of the most recently created client.
    pub fn last_settings(&self) -> Option<ClientSettings> {
        self.state
            .settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Number of clients created successfully.
    pub fn created(&self) -> usize {
        self.state.created.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> u64 {
        self.state.polls.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> u64 {
        self.state.flushes.load(Ordering::SeqCst)
    }
}

impl ClientFactory for MockClientFactory {
    fn create(
        &self,
        settings: &ClientSettings,
        stats: Arc<ProducerStats>,
    ) -> Result<Box<dyn BrokerClient>> {
        let rejected = self
            .state
            .rejected_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some((key, value)) = settings
            .iter()
            .find(|(k, _)| rejected.iter().any(|r| r.as_str() == *k))
        {
            return Err(Error::Config(format!(
                "Invalid value \"{}\" for configuration property \"{}\"",
                value, key
            )));
        }

        self.state
            .settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(settings.clone());
        self.state.created.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockClient {
            state: Arc::clone(&self.state),
            stats,
        }))
    }
}

pub struct MockClient {
    state: Arc<MockState>,
    stats: Arc<ProducerStats>,
}

impl BrokerClient for MockClient {
    fn send(&self, message: &KafkaMessage<'_>) -> std::result::Result<(), SubmitError> {
        if self.state.queue_full.load(Ordering::SeqCst) {
            return Err(SubmitError::QueueFull);
        }

        let attempt = self.state.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let every = self.state.reject_every.load(Ordering::SeqCst);
        if every > 0 && attempt % every == 0 {
            return Err(SubmitError::Rejected("Broker: simulated rejection".to_string()));
        }

        self.state
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentMessage {
                topic: message.topic.clone(),
                key: message.key.clone(),
                headers: message.headers.clone(),
                payload: message.payload.to_vec(),
            });
        self.state.pending.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn poll(&self) {
        self.state.polls.fetch_add(1, Ordering::SeqCst);
        let delivered = self.state.pending.swap(0, Ordering::SeqCst);
        for _ in 0..delivered {
            self.stats.record_delivered();
        }
    }

    fn flush(&self, _timeout: Duration) -> Result<()> {
        self.state.flushes.fetch_add(1, Ordering::SeqCst);
        self.poll();
        Ok(())
    }
}
