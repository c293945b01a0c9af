use std::sync::Arc;

use tracing::info;

use crate::backend::PrometheusBackend;
use crate::config::MeterConfig;
use crate::error::Result;
use crate::meter::{MeterController, MeterCore};
use crate::runtime::ProcessMetricSource;
use crate::server::{ExpositionHandler, HttpExpositionServer, PushGatewayPusher};

/// Build a running Prometheus-backed meter.
///
/// Base tags become constant labels of every family. The push gateway
/// pusher is attached when `push_gateway` is set and the HTTP server when
/// `prometheus_port` is non-zero; both and the runtime sampler are started
/// before returning, which needs a tokio runtime. Without one they log an
/// error and stay stopped while instruments still record.
pub fn new_prometheus_meter(config: MeterConfig) -> Result<MeterController> {
    config.validate()?;
    let config = Arc::new(config);

    let backend = PrometheusBackend::from_config(&config)?;
    let handler = ExpositionHandler::new(backend.registry().clone());
    let core = Arc::new(MeterCore::new(Arc::clone(&config), Arc::new(backend)));

    let mut controller = MeterController::new(
        core,
        Some(handler.clone()),
        Arc::new(ProcessMetricSource::new()),
    );

    if let Some(push) = &config.push_gateway {
        let pusher =
            PushGatewayPusher::new(push, &config.local_ip, handler.clone(), config.log.clone())?;
        controller = controller.with_server(Box::new(pusher));
    }

    if config.prometheus_port > 0 {
        controller = controller.with_server(Box::new(HttpExpositionServer::new(
            config.prometheus_port,
            handler,
            config.log.clone(),
        )));
    }

    controller.start();
    info!(?controller, "Prometheus meter ready");
    Ok(controller)
}
