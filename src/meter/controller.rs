//! Meter Controller
//!
//! Running/stopped state machine around a backend.
//!
//! ```text
//!            set_running(false)
//!   Running ───────────────────▶ Stopped
//!      ▲                            │
//!      └────────────────────────────┘
//!            set_running(true)
//! ```
//!
//! Transitions are a compare-and-set on the running flag, serialized so that
//! starting and stopping the sampler and servers never interleave. Asking
//! for the current state is logged and ignored.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{MetricsBackend, Recorder};
use crate::config::MeterConfig;
use crate::instrument::live::{LiveCounter, LiveGauge, LiveHistogram, LiveUpDownCounter};
use crate::instrument::{
    nop, Counter, Gauge, Histogram, InstrumentId, InstrumentKind, UpDownCounter,
};
use crate::meter::{InstrumentFactory, Meter};
use crate::runtime::{RuntimeMetricSource, RuntimeSampler};
use crate::server::{ExpositionHandler, MeterServer};

// =============================================================================
// Core
// =============================================================================

/// Instrument factory half of a meter, shared with the runtime sampler.
pub struct MeterCore {
    config: Arc<MeterConfig>,
    backend: Arc<dyn MetricsBackend>,
    running: AtomicBool,
}

impl MeterCore {
    /// Create a core in the running state
    pub fn new(config: Arc<MeterConfig>, backend: Arc<dyn MetricsBackend>) -> Self {
        Self {
            config,
            backend,
            running: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Flip the running flag from `!on` to `on`. False when already there.
    fn transition(&self, on: bool) -> bool {
        self.running
            .compare_exchange(!on, on, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn recorder(
        &self,
        kind: InstrumentKind,
        name: &str,
        description: &str,
        unit: &str,
    ) -> Option<(InstrumentId, Arc<dyn Recorder>)> {
        if !self.is_running() {
            return None;
        }

        let id = InstrumentId::new(name, description, unit);
        match self.backend.create(kind, &id) {
            Ok(recorder) => Some((id, recorder)),
            Err(e) => {
                self.config
                    .write_error(&format!("failed to create {} {}: {}", kind, name, e));
                None
            }
        }
    }
}

impl InstrumentFactory for MeterCore {
    fn new_counter(&self, name: &str, description: &str, unit: &str) -> Box<dyn Counter> {
        match self.recorder(InstrumentKind::Counter, name, description, unit) {
            Some((id, recorder)) => Box::new(LiveCounter::new(id, recorder)),
            None => nop::counter(),
        }
    }

    fn new_up_down_counter(
        &self,
        name: &str,
        description: &str,
        unit: &str,
    ) -> Box<dyn UpDownCounter> {
        match self.recorder(InstrumentKind::UpDownCounter, name, description, unit) {
            Some((id, recorder)) => Box::new(LiveUpDownCounter::new(id, recorder)),
            None => nop::up_down_counter(),
        }
    }

    fn new_gauge(&self, name: &str, description: &str, unit: &str) -> Box<dyn Gauge> {
        match self.recorder(InstrumentKind::Gauge, name, description, unit) {
            Some((id, recorder)) => Box::new(LiveGauge::new(id, recorder)),
            None => nop::gauge(),
        }
    }

    fn new_histogram(&self, name: &str, description: &str, unit: &str) -> Box<dyn Histogram> {
        match self.recorder(InstrumentKind::Histogram, name, description, unit) {
            Some((id, recorder)) => Box::new(LiveHistogram::new(id, recorder)),
            None => nop::histogram(),
        }
    }
}

impl fmt::Debug for MeterCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeterCore")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Live meter: a [`MeterCore`] plus the sampler and servers that follow its
/// running state.
pub struct MeterController {
    core: Arc<MeterCore>,
    handler: Option<ExpositionHandler>,
    sampler: RuntimeSampler,
    servers: Vec<Box<dyn MeterServer>>,
    transition: Mutex<()>,
}

impl MeterController {
    /// Assemble a controller. Nothing is started until [`start`](Self::start).
    pub fn new(
        core: Arc<MeterCore>,
        handler: Option<ExpositionHandler>,
        source: Arc<dyn RuntimeMetricSource>,
    ) -> Self {
        let sampler = RuntimeSampler::new(
            Arc::clone(&core.config),
            Arc::clone(&core) as Arc<dyn InstrumentFactory>,
            source,
        );

        Self {
            core,
            handler,
            sampler,
            servers: Vec::new(),
            transition: Mutex::new(()),
        }
    }

    pub fn with_server(mut self, server: Box<dyn MeterServer>) -> Self {
        self.servers.push(server);
        self
    }

    pub fn core(&self) -> &Arc<MeterCore> {
        &self.core
    }

    pub fn sampler(&self) -> &RuntimeSampler {
        &self.sampler
    }

    pub fn servers(&self) -> &[Box<dyn MeterServer>] {
        &self.servers
    }

    /// Start background work for the initial running state.
    pub fn start(&self) {
        let _guard = self.transition.lock();
        if self.core.is_running() {
            self.start_components();
        }
    }

    fn start_components(&self) {
        if self.core.config.runtime_metrics_collect {
            self.sampler.start();
        }
        for server in &self.servers {
            server.start();
        }
    }

    fn stop_components(&self) {
        if self.sampler.is_running() {
            self.sampler.stop();
        }
        for server in &self.servers {
            if server.is_running() {
                server.stop();
            }
        }
    }
}

impl InstrumentFactory for MeterController {
    fn new_counter(&self, name: &str, description: &str, unit: &str) -> Box<dyn Counter> {
        self.core.new_counter(name, description, unit)
    }

    fn new_up_down_counter(
        &self,
        name: &str,
        description: &str,
        unit: &str,
    ) -> Box<dyn UpDownCounter> {
        self.core.new_up_down_counter(name, description, unit)
    }

    fn new_gauge(&self, name: &str, description: &str, unit: &str) -> Box<dyn Gauge> {
        self.core.new_gauge(name, description, unit)
    }

    fn new_histogram(&self, name: &str, description: &str, unit: &str) -> Box<dyn Histogram> {
        self.core.new_histogram(name, description, unit)
    }
}

impl Meter for MeterController {
    fn handler(&self) -> Option<ExpositionHandler> {
        self.handler.clone()
    }

    fn set_running(&self, on: bool) {
        let _guard = self.transition.lock();

        if !self.core.transition(on) {
            self.core.config.write_info(if on {
                "meter already running"
            } else {
                "meter already stopped"
            });
            return;
        }

        if on {
            self.start_components();
            self.core.config.write_info("meter started");
        } else {
            self.stop_components();
            self.core.config.write_info("meter stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.core.is_running()
    }
}

impl Drop for MeterController {
    fn drop(&mut self) {
        self.stop_components();
    }
}

impl fmt::Debug for MeterController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeterController")
            .field("running", &self.core.is_running())
            .field("sampler", &self.sampler)
            .field(
                "servers",
                &self.servers.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
