//! Exposition
//!
//! Everything that gets recorded values out of the process:
//!
//! - [`ExpositionHandler`] - renders a registry in the Prometheus text format
//! - [`HttpExpositionServer`] - serves `/metrics` and `/actuator/health`
//! - [`PushGatewayPusher`] - periodically pushes to a Prometheus push gateway
//!
//! Servers follow the meter's running state: the controller starts them when
//! collection is switched on and stops them when it is switched off.

mod handler;
mod http;
mod push;

pub use handler::{Exposition, ExpositionHandler};
pub use http::HttpExpositionServer;
pub use push::PushGatewayPusher;

/// Background exposition component driven by the meter controller.
///
/// Both transitions are idempotent: starting a running server or stopping a
/// stopped one only logs.
pub trait MeterServer: Send + Sync {
    fn name(&self) -> &str;

    fn start(&self);

    fn stop(&self);

    fn is_running(&self) -> bool;
}
