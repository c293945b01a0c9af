//! Runtime Metrics
//!
//! Periodic harvesting of process and runtime readings into instruments.
//!
//! A [`RuntimeMetricSource`] produces a batch of [`RuntimeSample`]s; the
//! [`RuntimeSampler`] sanitizes each sample name and routes it by
//! cumulativeness and value kind:
//!
//! | Cumulative | Value | Instrument |
//! |------------|-------|------------|
//! | no | `UInt64` | gauge, absolute value |
//! | yes | `UInt64` | counter, reading used as the delta |
//! | yes | `Float64` | up/down counter |
//! | any | anything else | dropped |

mod process;
mod sampler;

pub use process::ProcessMetricSource;
pub use sampler::{RuntimeSampler, BASE_METRIC_TYPE, METRIC_TYPE_TAG, SYSTEM_METRIC_DESCRIPTION};

/// Value kind of a runtime sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    UInt64,
    Float64,
    Float64Histogram,
    Bad,
}

/// Value carried by a runtime sample
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    UInt64(u64),
    Float64(f64),
    /// Bucket boundaries and per-bucket counts
    Float64Histogram { buckets: Vec<f64>, counts: Vec<u64> },
    /// The source could not produce a reading
    Bad,
}

impl SampleValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            SampleValue::UInt64(_) => ValueKind::UInt64,
            SampleValue::Float64(_) => ValueKind::Float64,
            SampleValue::Float64Histogram { .. } => ValueKind::Float64Histogram,
            SampleValue::Bad => ValueKind::Bad,
        }
    }
}

/// One reading of a named runtime metric
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSample {
    /// Raw source name, e.g. `/process/cpu/user:seconds`
    pub name: String,

    /// Whether the value only ever grows over the process lifetime
    pub cumulative: bool,

    pub value: SampleValue,
}

impl RuntimeSample {
    pub fn new(name: impl Into<String>, cumulative: bool, value: SampleValue) -> Self {
        Self {
            name: name.into(),
            cumulative,
            value,
        }
    }

    pub fn gauge(name: impl Into<String>, value: u64) -> Self {
        Self::new(name, false, SampleValue::UInt64(value))
    }

    pub fn cumulative_u64(name: impl Into<String>, value: u64) -> Self {
        Self::new(name, true, SampleValue::UInt64(value))
    }

    pub fn cumulative_f64(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, true, SampleValue::Float64(value))
    }
}

/// Produces the samples of one collection pass
pub trait RuntimeMetricSource: Send + Sync {
    fn read(&self) -> Vec<RuntimeSample>;
}
