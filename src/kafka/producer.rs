//! The producer engine: one broker client shared by concurrent publishers
//! and a background thread draining delivery reports.
//!
//! Delivery is best effort. `produce` only reports whether the client
//! accepted the message; the asynchronous delivery outcome is drained by the
//! poll thread and counted in [`ProducerStats`], never returned to the caller.

use crate::config::{filter_driver_params, ClientSettings, ConnectorOptions};
use crate::kafka::client::{BrokerClient, ClientFactory, SubmitError};
use crate::kafka::mapper::KafkaMessage;
use crate::kafka::stats::{ProducerStats, StatsSnapshot};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Pause between two submission attempts while the client queue is full.
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(10);

/// Lifecycle of a [`KafkaProducer`].
///
/// An engine is `Configuring` while `start` builds its client and poll
/// thread, `Running` once `start` returns, and `Closed` after `close`.
/// `Closed` is terminal; a new engine must be started to publish again. A
/// failed `start` returns the error and leaves no engine behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Configuring,
    Running,
    Closed,
}

struct Shared {
    client: Box<dyn BrokerClient>,
    /// Guards the engine state. Every submission and delivery report drain
    /// happens while it is held, so no call reaches the client once `close`
    /// has marked the engine closed. Never held across a flush.
    gate: Mutex<EngineState>,
    stats: Arc<ProducerStats>,
}

impl Shared {
    fn lock_gate(&self) -> MutexGuard<'_, EngineState> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Poller {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct KafkaProducer {
    shared: Arc<Shared>,
    options: ConnectorOptions,
    poller: Mutex<Option<Poller>>,
}

impl KafkaProducer {
    /// Builds a running engine from the full step parameter map.
    ///
    /// Driver parameters configure the client; the remaining parameters are
    /// connector options.
    pub fn from_params(params: &HashMap<String, String>, factory: &dyn ClientFactory) -> Result<Self> {
        let options = ConnectorOptions::from_params(params)?;
        Self::start(&filter_driver_params(params), options, factory)
    }

    /// Translates the driver parameters, creates the client and launches the
    /// poll thread. Nothing is retained when any step fails.
    #[instrument(skip_all, fields(params = driver_params.len()))]
    pub fn start(
        driver_params: &HashMap<String, String>,
        options: ConnectorOptions,
        factory: &dyn ClientFactory,
    ) -> Result<Self> {
        debug!("Configuring Kafka producer");
        let settings = ClientSettings::from_driver_params(driver_params);

        let stats = Arc::new(ProducerStats::default());
        let client = factory.create(&settings, Arc::clone(&stats))?;
        let shared = Arc::new(Shared {
            client,
            gate: Mutex::new(EngineState::Configuring),
            stats,
        });

        let poller = spawn_poller(Arc::clone(&shared), options.poll_interval())?;
        *shared.lock_gate() = EngineState::Running;
        info!(
            poll_interval_ms = options.poll_interval_ms,
            queue_full_timeout_ms = options.queue_full_timeout_ms,
            "Kafka producer running"
        );

        Ok(Self {
            shared,
            options,
            poller: Mutex::new(Some(poller)),
        })
    }

    pub fn state(&self) -> EngineState {
        *self.shared.lock_gate()
    }

    /// Hands one message to the client.
    ///
    /// Safe to call from many threads at once. The gate is held for a single
    /// submission only. A full queue fails immediately unless
    /// `queue_full_timeout_ms` is set, in which case submission is retried
    /// until the timeout elapses. Never retries any other rejection.
    pub fn produce(&self, message: &KafkaMessage<'_>) -> Result<()> {
        let deadline = Instant::now() + self.options.queue_full_timeout();

        loop {
            let outcome = {
                let state = self.shared.lock_gate();
                if *state != EngineState::Running {
                    return Err(Error::ProducerClosed);
                }
                self.shared.client.send(message)
            };

            match outcome {
                Ok(()) => {
                    self.shared.stats.record_submitted();
                    debug!(
                        topic = %message.topic,
                        bytes = message.payload.len(),
                        "Enqueued message"
                    );
                    return Ok(());
                }
                Err(SubmitError::QueueFull) if Instant::now() < deadline => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    thread::sleep(QUEUE_FULL_BACKOFF.min(remaining));
                }
                Err(e) => {
                    self.shared.stats.record_rejected();
                    warn!(topic = %message.topic, "Failed to produce message: {}", e);
                    return Err(Error::Submit(e.to_string()));
                }
            }
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Marks the engine closed, stops and joins the poll thread, then flushes
    /// outstanding messages within `flush_timeout_ms`. Further calls are
    /// no-ops.
    ///
    /// Submissions that won the gate before this call are already queued
    /// when the flush begins; later ones get [`Error::ProducerClosed`].
    pub fn close(&self) {
        {
            let mut state = self.shared.lock_gate();
            if *state == EngineState::Closed {
                return;
            }
            *state = EngineState::Closed;
        }

        let poller = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(poller) = poller {
            // The thread may already be gone; a failed send is harmless.
            let _ = poller.stop_tx.send(());
            if poller.handle.join().is_err() {
                warn!("Delivery report poll thread panicked");
            }
        }

        if let Err(e) = self.shared.client.flush(self.options.flush_timeout()) {
            warn!("Kafka producer flush did not complete: {}", e);
        }
        info!(stats = ?self.stats(), "Kafka producer closed");
    }
}

impl Drop for KafkaProducer {
    fn drop(&mut self) {
        self.close();
    }
}

fn spawn_poller(shared: Arc<Shared>, interval: Duration) -> Result<Poller> {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    let handle = thread::Builder::new()
        .name("kafka-delivery-poll".to_string())
        .spawn(move || loop {
            {
                let state = shared.lock_gate();
                if *state == EngineState::Closed {
                    break;
                }
                shared.client.poll();
            }
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        })?;

    Ok(Poller { stop_tx, handle })
}
