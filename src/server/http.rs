//! Exposition HTTP server
//!
//! Minimal hyper 1 server answering:
//!
//! | Path | Response |
//! |------|----------|
//! | `/metrics` | Prometheus text exposition |
//! | `/actuator/health` | `{"status":"UP"}` as `text/json` |
//! | anything else | 404 |

use std::convert::Infallible;
use std::net::SocketAddr;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::LogSink;
use crate::error::{Error, Result};
use crate::server::{ExpositionHandler, MeterServer};
use crate::task::BackgroundTask;

const HEALTH_BODY: &str = r#"{"status":"UP"}"#;

/// Serves the exposition of one handler over HTTP
pub struct HttpExpositionServer {
    addr: SocketAddr,
    handler: ExpositionHandler,
    log: LogSink,
    local_addr: Mutex<Option<SocketAddr>>,
    task: BackgroundTask,
}

impl HttpExpositionServer {
    /// Server bound to all interfaces on `port`
    pub fn new(port: u16, handler: ExpositionHandler, log: LogSink) -> Self {
        Self::with_addr(SocketAddr::from(([0, 0, 0, 0], port)), handler, log)
    }

    pub fn with_addr(addr: SocketAddr, handler: ExpositionHandler, log: LogSink) -> Self {
        Self {
            addr,
            handler,
            log,
            local_addr: Mutex::new(None),
            task: BackgroundTask::new("exposition server"),
        }
    }

    /// Address actually bound by the last successful start
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }
}

impl MeterServer for HttpExpositionServer {
    fn name(&self) -> &str {
        self.task.name()
    }

    fn start(&self) {
        let result = self.task.start(|token| {
            let (listener, local) = bind(self.addr)?;
            *self.local_addr.lock() = Some(local);
            Ok(serve(listener, self.handler.clone(), token))
        });

        match result {
            Ok(true) => self.log.write_info(&format!(
                "exposition server listening on {}",
                self.local_addr().unwrap_or(self.addr)
            )),
            Ok(false) => self.log.write_info("exposition server already running"),
            Err(e) => self
                .log
                .write_error(&format!("failed to start exposition server on {}: {}", self.addr, e)),
        }
    }

    fn stop(&self) {
        if self.task.stop() {
            self.log.write_info("exposition server stopped");
        } else {
            self.log.write_info("exposition server not running");
        }
    }

    fn is_running(&self) -> bool {
        self.task.is_running()
    }
}

/// Bind synchronously so address errors surface at start.
fn bind(addr: SocketAddr) -> Result<(TcpListener, SocketAddr)> {
    let server_error = |e: std::io::Error| Error::Server(format!("bind {}: {}", addr, e));

    let listener = std::net::TcpListener::bind(addr).map_err(server_error)?;
    listener.set_nonblocking(true).map_err(server_error)?;
    let local = listener.local_addr().map_err(server_error)?;
    let listener = TcpListener::from_std(listener).map_err(server_error)?;
    Ok((listener, local))
}

async fn serve(listener: TcpListener, handler: ExpositionHandler, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("Exposition server shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Exposition server accept error: {}", e);
                        continue;
                    }
                };

                let io = TokioIo::new(stream);
                let handler = handler.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let response = route(&handler, req.uri().path());
                        async move { Ok::<_, Infallible>(response) }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        debug!(%peer, "Exposition connection error: {}", e);
                    }
                });
            }
        }
    }
}

fn route(handler: &ExpositionHandler, path: &str) -> Response<Full<Bytes>> {
    match path {
        "/metrics" => match handler.render() {
            Ok(exposition) => response(StatusCode::OK, &exposition.content_type, exposition.body),
            Err(e) => response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                e.to_string().into_bytes(),
            ),
        },
        "/actuator/health" => response(StatusCode::OK, "text/json", HEALTH_BODY.as_bytes().to_vec()),
        _ => response(StatusCode::NOT_FOUND, "text/plain", b"not found".to_vec()),
    }
}

fn response(status: StatusCode, content_type: &str, body: Vec<u8>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(content_type) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}

// =============================================================================
// Tests
// =============================================================================
