//! Step lifecycle: the host-facing connector and its registry of steps.
//!
//! The host drives every step through
//! `configure -> set_param* -> start -> process_record* -> shutdown`.
//! Lifecycle calls for one handle arrive sequentially; `process_record` may
//! arrive from many threads at once once the step is started.
//!
//! # Example
//!
//! ```rust,no_run
//! use kafka_destination::step::{Connector, StepConfig, StepKind};
//! use kafka_destination::Record;
//!
//! let connector = Connector::default();
//! connector.configure(StepConfig::new(StepKind::Destination, 1)).unwrap();
//! connector.set_param(1, "driver.bootstrap_servers", "localhost:9092");
//! connector.start(1).unwrap();
//!
//! let record = Record::new("hello").with_metadata("kafka.topic", "events");
//! connector.process_record(&record, 1).unwrap();
//!
//! connector.shutdown(1);
//! ```

use crate::error::ConfigureError;
use crate::kafka::client::{ClientFactory, RdKafkaClientFactory};
use crate::kafka::mapper::KafkaMessage;
use crate::kafka::producer::KafkaProducer;
use crate::kafka::stats::StatsSnapshot;
use crate::record::Record;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, instrument, warn};

/// Identifies one configured step. Assigned by the host.
pub type ModuleHandle = u32;

/// Version of the plugin boundary this connector implements.
pub const API_VERSION: u32 = 1;
pub const MODULE_ID: &str = "kafka";
pub const MODULE_NAME: &str = "Kafka destination";

/// Position of a step in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Produces data itself, no input from other steps.
    Source,
    /// Receives data from a previous step and passes results on.
    Transformation,
    /// Final point of the pipeline. The only kind this connector supports.
    Destination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Step,
}

/// Static module descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleInfo {
    pub api_version: u32,
    pub id: &'static str,
    pub kind: ModuleKind,
    pub name: &'static str,
}

pub fn module_info() -> ModuleInfo {
    ModuleInfo {
        api_version: API_VERSION,
        id: MODULE_ID,
        kind: ModuleKind::Step,
        name: MODULE_NAME,
    }
}

pub type TerminationHandler = Arc<dyn Fn(ModuleHandle) + Send + Sync>;
pub type DataReceivedHandler = Arc<dyn Fn(Record, ModuleHandle) + Send + Sync>;

/// Arguments captured when a step is configured.
#[derive(Clone)]
pub struct StepConfig {
    pub kind: StepKind,
    pub handle: ModuleHandle,
    pub on_terminate: Option<TerminationHandler>,
    /// Part of the uniform step contract; a destination never emits data.
    pub on_data_received: Option<DataReceivedHandler>,
}

impl StepConfig {
    pub fn new(kind: StepKind, handle: ModuleHandle) -> Self {
        Self {
            kind,
            handle,
            on_terminate: None,
            on_data_received: None,
        }
    }

    pub fn with_termination_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(ModuleHandle) + Send + Sync + 'static,
    {
        self.on_terminate = Some(Arc::new(handler));
        self
    }

    pub fn with_data_received_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(Record, ModuleHandle) + Send + Sync + 'static,
    {
        self.on_data_received = Some(Arc::new(handler));
        self
    }
}

impl fmt::Debug for StepConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepConfig")
            .field("kind", &self.kind)
            .field("handle", &self.handle)
            .field("on_terminate", &self.on_terminate.is_some())
            .field("on_data_received", &self.on_data_received.is_some())
            .finish()
    }
}

/// Lifecycle state of a handle. A shut down step is removed from the
/// registry and reads as `Unconfigured` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Unconfigured,
    Configured,
    Started,
}

enum StepState {
    Configured,
    Started(Arc<KafkaProducer>),
}

struct StepEntry {
    config: StepConfig,
    params: HashMap<String, String>,
    state: StepState,
}

impl StepEntry {
    fn state_name(&self) -> &'static str {
        match self.state {
            StepState::Configured => "configured",
            StepState::Started(_) => "started",
        }
    }
}

/// The connector: owns every configured step and its producer.
pub struct Connector {
    factory: Box<dyn ClientFactory>,
    steps: RwLock<HashMap<ModuleHandle, StepEntry>>,
}

impl Default for Connector {
    fn default() -> Self {
        Self::new(RdKafkaClientFactory)
    }
}

impl Connector {
    pub fn new<F: ClientFactory + 'static>(factory: F) -> Self {
        Self {
            factory: Box::new(factory),
            steps: RwLock::new(HashMap::new()),
        }
    }

    fn read_steps(&self) -> RwLockReadGuard<'_, HashMap<ModuleHandle, StepEntry>> {
        self.steps.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_steps(&self) -> RwLockWriteGuard<'_, HashMap<ModuleHandle, StepEntry>> {
        self.steps.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the step. Only destination steps are accepted, and a handle
    /// that is already configured is rejected rather than overwritten.
    pub fn configure(&self, config: StepConfig) -> std::result::Result<(), ConfigureError> {
        if config.kind != StepKind::Destination {
            warn!(handle = config.handle, kind = ?config.kind, "Step kind not supported");
            return Err(ConfigureError::KindNotSupported);
        }

        let handle = config.handle;
        let mut steps = self.write_steps();
        if let Some(existing) = steps.get(&handle) {
            return Err(ConfigureError::Misc(format!(
                "Step '{}' is already {}",
                handle,
                existing.state_name()
            )));
        }

        steps.insert(
            handle,
            StepEntry {
                config,
                params: HashMap::new(),
                state: StepState::Configured,
            },
        );
        info!(handle, "Step configured");
        Ok(())
    }

    /// Stores a step parameter. Values set after `start` are kept for the
    /// next start and never reach the running producer.
    pub fn set_param(&self, handle: ModuleHandle, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let mut steps = self.write_steps();
        let Some(entry) = steps.get_mut(&handle) else {
            warn!(handle, key = %key, "Ignoring parameter for unconfigured step");
            return;
        };

        if let StepState::Started(_) = entry.state {
            warn!(handle, key = %key, "Parameter set after start; applies on next start only");
        } else {
            debug!(handle, key = %key, "Step parameter set");
        }
        entry.params.insert(key, value.into());
    }

    /// Builds the step's producer from its parameters.
    ///
    /// Starting a started step builds a fresh producer and swaps it in; the
    /// previous one closes once in-flight publishes release it.
    #[instrument(skip(self))]
    pub fn start(&self, handle: ModuleHandle) -> Result<()> {
        let params = self
            .read_steps()
            .get(&handle)
            .map(|entry| entry.params.clone())
            .ok_or(Error::StepNotFound(handle))?;

        let producer = Arc::new(KafkaProducer::from_params(&params, &*self.factory)?);

        let previous = {
            let mut steps = self.write_steps();
            let entry = steps.get_mut(&handle).ok_or(Error::StepNotFound(handle))?;
            std::mem::replace(&mut entry.state, StepState::Started(producer))
        };

        if let StepState::Started(old) = previous {
            info!(handle, "Step restarted with a new producer");
            old.close();
        } else {
            info!(handle, "Step started");
        }
        Ok(())
    }

    /// Publishes one record. Failures are per record and leave the step
    /// started; nothing is retried here.
    pub fn process_record(&self, record: &Record, handle: ModuleHandle) -> Result<()> {
        let producer = self.producer(handle)?;
        let message = KafkaMessage::from_record(record)?;
        producer.produce(&message)
    }

    /// Removes the step, closes its producer and notifies the host through
    /// the termination handler. Returns the producer's final counters when
    /// the step was started.
    pub fn shutdown(&self, handle: ModuleHandle) -> Option<StatsSnapshot> {
        let Some(entry) = self.write_steps().remove(&handle) else {
            warn!(handle, "Shutdown requested for unknown step");
            return None;
        };

        let stats = match &entry.state {
            StepState::Started(producer) => {
                producer.close();
                Some(producer.stats())
            }
            StepState::Configured => None,
        };
        info!(handle, "Step shut down");

        if let Some(on_terminate) = &entry.config.on_terminate {
            on_terminate(handle);
        }
        stats
    }

    pub fn status(&self, handle: ModuleHandle) -> StepStatus {
        match self.read_steps().get(&handle).map(|entry| &entry.state) {
            None => StepStatus::Unconfigured,
            Some(StepState::Configured) => StepStatus::Configured,
            Some(StepState::Started(_)) => StepStatus::Started,
        }
    }

    /// Counters of the step's live producer.
    pub fn stats(&self, handle: ModuleHandle) -> Option<StatsSnapshot> {
        self.producer(handle).ok().map(|producer| producer.stats())
    }

    fn producer(&self, handle: ModuleHandle) -> Result<Arc<KafkaProducer>> {
        let steps = self.read_steps();
        let entry = steps.get(&handle).ok_or(Error::StepNotFound(handle))?;
        match &entry.state {
            StepState::Started(producer) => Ok(Arc::clone(producer)),
            StepState::Configured => Err(Error::InvalidState {
                handle,
                state: entry.state_name(),
                message: "cannot process records before start".to_string(),
            }),
        }
    }
}
