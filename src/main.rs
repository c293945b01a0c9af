//! metercore demo server
//!
//! Serves a tiny HTTP API exercising the global meter:
//!
//! | Path | Effect |
//! |------|--------|
//! | `/hello` | increments `http_counter{test1="test1"}` |
//! | `/closeMeter` | switches collection off |
//! | `/startMeter` | switches collection back on |
//! | `/metrics` | Prometheus text exposition of the meter |
//!
//! The meter's own exposition server listens on `--prometheus-port` as well.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use metercore::{
    global_meter, new_meter, set_global_meter, InstrumentFactory, Meter, MeterConfig, MeterEnv,
    MeterProviderType,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// metercore demo - instrumented HTTP server with runtime meter toggling
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Demo server port
    #[arg(long, env = "DEMO_PORT", default_value = "8080")]
    port: u16,

    /// Exposition server port (0 disables it)
    #[arg(long, env = "PROMETHEUS_PORT", default_value = "9464")]
    prometheus_port: u16,

    /// Deployment environment (production, test, dev)
    #[arg(long, env = "METER_ENV", default_value = "production")]
    env: MeterEnv,

    /// Enable runtime metric collection
    #[arg(long, env = "RUNTIME_METRICS")]
    runtime_metrics: bool,

    /// YAML meter configuration; replaces --prometheus-port and --env
    #[arg(long, env = "METER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    let config = meter_config(&args)?;
    info!("Starting metercore demo");
    info!("  Environment: {}", config.env);
    info!("  Provider: {:?}", config.provider);
    info!("  Exposition port: {}", config.prometheus_port);
    info!("  Runtime metrics: {}", config.runtime_metrics_collect);

    let meter = new_meter(config).context("failed to build meter")?;
    set_global_meter(meter);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind demo server on {}", addr))?;

    info!("Demo server listening on {}", addr);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (stream, _) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Demo server accept error: {}", e);
                        continue;
                    }
                };

                tokio::spawn(async move {
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service_fn(demo_handler))
                        .await
                    {
                        error!("Demo connection error: {}", e);
                    }
                });
            }
        }
    }

    Ok(())
}

fn meter_config(args: &Args) -> anyhow::Result<MeterConfig> {
    let mut config = match &args.config {
        Some(path) => MeterConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => MeterConfig::new()
            .with_provider(MeterProviderType::Prometheus)
            .with_env(args.env)
            .with_prometheus_port(args.prometheus_port),
    };

    if args.runtime_metrics {
        config = config.with_runtime_metrics_collector();
    }
    Ok(config)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}

// =============================================================================
// Demo Handler
// =============================================================================

async fn demo_handler(
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let meter = global_meter();

    let (status, body) = match req.uri().path() {
        "/hello" => {
            meter
                .new_counter("http_counter", "demo requests", "")
                .add_tag("test1", "test1")
                .incr_one();
            (StatusCode::OK, "hello".to_string())
        }
        "/closeMeter" => {
            meter.set_running(false);
            (StatusCode::OK, "meter stopped".to_string())
        }
        "/startMeter" => {
            meter.set_running(true);
            (StatusCode::OK, "meter started".to_string())
        }
        "/metrics" => match meter.handler().map(|handler| handler.render()) {
            Some(Ok(exposition)) => {
                return Ok(response(
                    StatusCode::OK,
                    &exposition.content_type,
                    exposition.body,
                ))
            }
            Some(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
        },
        _ => (StatusCode::NOT_FOUND, "not found".to_string()),
    };

    Ok(response(status, "text/plain", body.into_bytes()))
}

fn response(status: StatusCode, content_type: &str, body: Vec<u8>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(content_type) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}
