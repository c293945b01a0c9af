//! Instruments
//!
//! Typed measurement handles handed out by a meter:
//!
//! - [`Counter`] - monotonic increments
//! - [`UpDownCounter`] - increments and decrements
//! - [`Gauge`] - absolute instantaneous readings
//! - [`Histogram`] - value distributions, usually durations in seconds
//!
//! Live implementations live in [`live`], discarding ones in [`nop`]. Both
//! satisfy the same traits so callers never branch on whether collection is
//! enabled.
//!
//! Tagging consumes the boxed instrument and hands it back, which keeps
//! construction fluent:
//!
//! ```ignore
//! meter
//!     .new_counter("http_requests", "served requests", "")
//!     .add_tag("route", "/hello")
//!     .incr_one();
//! ```

mod base;
pub mod live;
pub mod nop;

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

pub use base::InstrumentBase;

// =============================================================================
// Identity
// =============================================================================

/// Kind of an instrument, as seen by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    Counter,
    UpDownCounter,
    Gauge,
    Histogram,
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentKind::Counter => write!(f, "counter"),
            InstrumentKind::UpDownCounter => write!(f, "up_down_counter"),
            InstrumentKind::Gauge => write!(f, "gauge"),
            InstrumentKind::Histogram => write!(f, "histogram"),
        }
    }
}

/// Name, description and unit of an instrument. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstrumentId {
    pub name: String,
    pub description: String,
    pub unit: String,
}

impl InstrumentId {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            unit: unit.into(),
        }
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// =============================================================================
// Contracts
// =============================================================================

/// Monotonic counter.
///
/// Deltas should be non-negative; this is left to the backend to enforce.
pub trait Counter: Send + Sync {
    fn incr(&self, delta: f64);

    fn incr_one(&self) {
        self.incr(1.0);
    }

    fn add_tag(self: Box<Self>, key: &str, value: &str) -> Box<dyn Counter>;

    fn with_tags(self: Box<Self>, tags: &HashMap<String, String>) -> Box<dyn Counter>;
}

/// Counter that may go down.
pub trait UpDownCounter: Send + Sync {
    fn update(&self, delta: f64);

    fn incr_one(&self) {
        self.update(1.0);
    }

    fn decr_one(&self) {
        self.update(-1.0);
    }

    fn add_tag(self: Box<Self>, key: &str, value: &str) -> Box<dyn UpDownCounter>;

    fn with_tags(self: Box<Self>, tags: &HashMap<String, String>) -> Box<dyn UpDownCounter>;
}

/// Instantaneous reading; `update` records an absolute value, not a delta.
pub trait Gauge: Send + Sync {
    fn update(&self, value: f64);

    fn add_tag(self: Box<Self>, key: &str, value: &str) -> Box<dyn Gauge>;

    fn with_tags(self: Box<Self>, tags: &HashMap<String, String>) -> Box<dyn Gauge>;
}

/// Distribution of values, recorded in seconds.
pub trait Histogram: Send + Sync {
    fn update_in_seconds(&self, seconds: f64);

    fn update(&self, duration: Duration) {
        self.update_in_seconds(duration.as_secs_f64());
    }

    fn update_in_milliseconds(&self, millis: f64) {
        self.update_in_seconds(millis / 1000.0);
    }

    /// Record the time elapsed since `start`.
    fn update_since(&self, start: Instant) {
        self.update_in_seconds(start.elapsed().as_secs_f64());
    }

    /// Run `f` synchronously and record its wall-clock duration.
    fn time(&self, f: &mut dyn FnMut()) {
        let start = Instant::now();
        f();
        self.update_since(start);
    }

    fn add_tag(self: Box<Self>, key: &str, value: &str) -> Box<dyn Histogram>;

    fn with_tags(self: Box<Self>, tags: &HashMap<String, String>) -> Box<dyn Histogram>;
}
