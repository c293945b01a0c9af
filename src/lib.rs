//! metercore - Metrics Instrumentation Core
//!
//! Typed instruments (counters, up/down counters, gauges, histograms) backed
//! by Prometheus, a meter whose collection can be switched on and off at
//! runtime, and a sampler that harvests process metrics into instruments.
//!
//! # Architecture
//!
//! ```text
//! MeterConfig → new_meter() → MeterController ──▶ PrometheusBackend ──▶ Registry
//!                                  ▲                                      │
//!                            RuntimeSampler                 HTTP server / push gateway
//! ```
//!
//! # Example
//!
//! ```no_run
//! use metercore::{new_meter, InstrumentFactory, MeterConfig, MeterProviderType};
//!
//! let meter = new_meter(MeterConfig::new().with_provider(MeterProviderType::Prometheus))?;
//! meter
//!     .new_counter("http_requests", "served requests", "")
//!     .add_tag("route", "/hello")
//!     .incr_one();
//! # Ok::<(), metercore::Error>(())
//! ```
//!
//! Every instrument forwards only its first recording; later calls on the
//! same instance are ignored. Create a fresh instrument per measurement
//! (cheap: families are shared by name) when recording repeatedly.
//!
//! # Modules
//!
//! - [`backend`] - Recorder seam, Prometheus and in-memory backends
//! - [`config`] - Meter configuration and YAML loading
//! - [`error`] - Error types
//! - [`instrument`] - Instrument contracts, live and no-op implementations
//! - [`meter`] - Meter controller, no-op meter, factory and global meter
//! - [`naming`] - Metric name sanitization
//! - [`runtime`] - Runtime sampler and process metric source
//! - [`server`] - Exposition handler, HTTP server and push gateway pusher
//! - [`tag`] - Tags and tag sets

pub mod backend;
pub mod config;
pub mod error;
pub mod instrument;
pub mod meter;
pub mod naming;
pub mod runtime;
pub mod server;
pub mod tag;

mod task;

// Re-export commonly used types
pub use config::{MeterConfig, MeterEnv, MeterProviderType, PushGatewayConfig};
pub use error::{Error, Result};
pub use instrument::{Counter, Gauge, Histogram, UpDownCounter};
pub use meter::{
    global_meter, new_meter, new_prometheus_meter, set_global_meter, InstrumentFactory, Meter,
    MeterController, NopMeter,
};
pub use naming::sanitize_metric_name;
pub use runtime::{RuntimeMetricSource, RuntimeSample, RuntimeSampler, SampleValue};
pub use server::{ExpositionHandler, MeterServer};
pub use tag::{Tag, TagSet};
