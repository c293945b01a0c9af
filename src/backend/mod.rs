//! Metrics Backends
//!
//! The sink that actually aggregates and exports values. A meter asks its
//! backend for one [`Recorder`] per instrument; the recorder receives
//! `(value, tags)` with the semantics of the instrument kind:
//!
//! | Kind | Recorder semantics |
//! |------|--------------------|
//! | Counter | add a non-negative delta |
//! | UpDownCounter | add a signed delta |
//! | Gauge | set the absolute value |
//! | Histogram | observe one value |
//!
//! # Implementations
//!
//! - [`PrometheusBackend`] - registers families in a `prometheus::Registry`
//! - [`InMemoryBackend`] - keeps every measurement for inspection in tests

mod memory;
mod prometheus;

use std::sync::Arc;

use crate::error::Result;
use crate::instrument::{InstrumentId, InstrumentKind};
use crate::tag::TagSet;

pub use memory::{InMemoryBackend, RecordedMeasurement};
pub use self::prometheus::PrometheusBackend;

/// Per-instrument sink handle.
///
/// Recording is synchronous and must never block on I/O. Failures are the
/// recorder's own business: they are logged and the value is dropped.
pub trait Recorder: Send + Sync {
    fn record(&self, value: f64, tags: &TagSet);
}

/// Creates recorders for instruments.
pub trait MetricsBackend: Send + Sync {
    /// Create the recorder backing one instrument.
    ///
    /// Creating the same name and kind twice is allowed and yields recorders
    /// feeding the same series family.
    fn create(&self, kind: InstrumentKind, id: &InstrumentId) -> Result<Arc<dyn Recorder>>;
}
