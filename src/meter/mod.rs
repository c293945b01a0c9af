//! Meters
//!
//! A meter hands out instruments and owns the background machinery that
//! gets their values out of the process.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐     ┌──────────────────────────────────────────┐
//! │ new_meter()   │────▶│ MeterController                          │
//! └───────────────┘     │  ├─ MeterCore ──▶ MetricsBackend         │
//!                       │  │    ▲ (InstrumentFactory)              │
//!                       │  ├─ RuntimeSampler                       │
//!                       │  └─ MeterServer* (HTTP, push gateway)    │
//!                       └──────────────────────────────────────────┘
//! ```
//!
//! The sampler only sees the [`InstrumentFactory`] half of the meter, which
//! is the shared [`MeterCore`]; the controller owns the sampler. Switching
//! the meter off makes the core hand out no-op instruments and stops the
//! sampler and servers; instruments created earlier keep working.

mod controller;
mod global;
mod nop;
mod prometheus;

use std::sync::Arc;

use tracing::info;

use crate::config::{MeterConfig, MeterProviderType};
use crate::error::Result;
use crate::instrument::{Counter, Gauge, Histogram, UpDownCounter};
use crate::server::ExpositionHandler;

pub use controller::{MeterController, MeterCore};
pub use global::{global_meter, set_global_meter};
pub use nop::NopMeter;
pub use self::prometheus::new_prometheus_meter;

/// Creates instruments.
///
/// Never fails: when collection is off or the backend refuses the
/// instrument, a no-op instrument is returned instead.
pub trait InstrumentFactory: Send + Sync {
    fn new_counter(&self, name: &str, description: &str, unit: &str) -> Box<dyn Counter>;

    fn new_up_down_counter(
        &self,
        name: &str,
        description: &str,
        unit: &str,
    ) -> Box<dyn UpDownCounter>;

    fn new_gauge(&self, name: &str, description: &str, unit: &str) -> Box<dyn Gauge>;

    fn new_histogram(&self, name: &str, description: &str, unit: &str) -> Box<dyn Histogram>;
}

/// Full meter capability set
pub trait Meter: InstrumentFactory {
    /// Exposition handler bound at construction; `None` for the no-op meter.
    fn handler(&self) -> Option<ExpositionHandler>;

    /// Switch collection on or off. Asking for the current state only logs.
    fn set_running(&self, on: bool);

    fn is_running(&self) -> bool;
}

/// Build the meter selected by `config`.
///
/// The `dev` environment and the `none` provider both yield a [`NopMeter`].
pub fn new_meter(config: MeterConfig) -> Result<Arc<dyn Meter>> {
    if config.is_dev() {
        info!("Dev environment, metrics disabled");
        return Ok(Arc::new(NopMeter));
    }

    match config.provider {
        MeterProviderType::Prometheus => Ok(Arc::new(new_prometheus_meter(config)?)),
        MeterProviderType::None => {
            info!("No meter provider configured, metrics disabled");
            Ok(Arc::new(NopMeter))
        }
    }
}
