//! Push gateway pusher
//!
//! Pushes the full exposition with `PUT {address}/metrics/job/{job}` once on
//! start and then on every push period. The job name is the configured local
//! address.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use reqwest::Client;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{check_interval, LogSink, PushGatewayConfig};
use crate::error::{Error, Result};
use crate::server::{ExpositionHandler, MeterServer};
use crate::task::BackgroundTask;

const DEFAULT_JOB: &str = "metercore";
const PUSH_TIMEOUT: Duration = Duration::from_secs(10);

struct PushTarget {
    url: String,
    client: Client,
    handler: ExpositionHandler,
    log: LogSink,
}

impl PushTarget {
    async fn push(&self) -> Result<()> {
        let exposition = self.handler.render()?;

        let response = self
            .client
            .put(&self.url)
            .header(reqwest::header::CONTENT_TYPE, exposition.content_type)
            .body(exposition.body)
            .send()
            .await
            .map_err(|e| Error::Push(format!("request to {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Push(format!(
                "{} answered {}",
                self.url,
                response.status()
            )));
        }
        Ok(())
    }
}

/// Periodically pushes a handler's exposition to a push gateway
pub struct PushGatewayPusher {
    target: Arc<PushTarget>,
    period: Duration,
    task: BackgroundTask,
}

impl PushGatewayPusher {
    pub fn new(
        push: &PushGatewayConfig,
        local_ip: &str,
        handler: ExpositionHandler,
        log: LogSink,
    ) -> Result<Self> {
        check_interval("push gateway push_period", push.push_period)?;

        let client = Client::builder()
            .timeout(PUSH_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(|e| Error::Push(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            target: Arc::new(PushTarget {
                url: push_url(&push.address, local_ip),
                client,
                handler,
                log,
            }),
            period: push.push_period,
            task: BackgroundTask::new("push gateway pusher"),
        })
    }

    pub fn url(&self) -> &str {
        &self.target.url
    }

    /// Push the current exposition once.
    pub async fn push_once(&self) -> Result<()> {
        self.target.push().await
    }
}

impl MeterServer for PushGatewayPusher {
    fn name(&self) -> &str {
        self.task.name()
    }

    fn start(&self) {
        let target = Arc::clone(&self.target);
        let period = self.period;

        match self.task.start(|token| Ok(run(target, period, token))) {
            Ok(true) => self.target.log.write_info(&format!(
                "pushing metrics to {} every {:?}",
                self.target.url, self.period
            )),
            Ok(false) => self.target.log.write_info("push gateway pusher already running"),
            Err(e) => self
                .target
                .log
                .write_error(&format!("failed to start push gateway pusher: {}", e)),
        }
    }

    fn stop(&self) {
        if self.task.stop() {
            self.target.log.write_info("push gateway pusher stopped");
        } else {
            self.target.log.write_info("push gateway pusher not running");
        }
    }

    fn is_running(&self) -> bool {
        self.task.is_running()
    }
}

async fn run(target: Arc<PushTarget>, period: Duration, token: CancellationToken) {
    // The first tick completes immediately.
    let mut tick = interval(period);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("Push gateway pusher shutting down");
                break;
            }
            _ = tick.tick() => {
                let start = Instant::now();
                match target.push().await {
                    Ok(()) => {
                        debug!(url = %target.url, "Pushed metrics");
                        target.log.write_info(&format!(
                            "pushed metrics to {} in {:?} at {}",
                            target.url,
                            start.elapsed(),
                            Local::now().format("%Y-%m-%d %H:%M:%S")
                        ));
                    }
                    Err(e) => target.log.write_error(&format!("push failed: {}", e)),
                }
            }
        }
    }
}

fn push_url(address: &str, local_ip: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    let base = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };

    let job = if local_ip.trim().is_empty() {
        DEFAULT_JOB
    } else {
        local_ip.trim()
    };

    format!("{}/metrics/job/{}", base, urlencoding::encode(job))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use http_body_util::{BodyExt, Full};
    use hyper::body::{Bytes, Incoming};
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response};
    use hyper_util::rt::TokioIo;
    use parking_lot::Mutex;
    use prometheus::{IntCounter, Registry};
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    type Received = Arc<Mutex<Vec<(String, String, String)>>>;

    async fn fake_gateway() -> (SocketAddr, Received) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let sink = Arc::clone(&sink);
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let sink = Arc::clone(&sink);
                        async move {
                            let method = req.method().to_string();
                            let path = req.uri().path().to_string();
                            let body = req
                                .into_body()
                                .collect()
                                .await
                                .map(|collected| collected.to_bytes())
                                .unwrap_or_default();
                            sink.lock()
                                .push((method, path, String::from_utf8_lossy(&body).into_owned()));
                            Ok::<_, Infallible>(Response::new(Full::new(Bytes::new())))
                        }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        (addr, received)
    }

    fn handler() -> ExpositionHandler {
        let registry = Registry::new();
        let counter = IntCounter::new("pushed_total", "pushed").unwrap();
        registry.register(Box::new(counter.clone())).unwrap();
        counter.inc();
        ExpositionHandler::new(registry)
    }

    fn pusher(address: String, period: Duration) -> PushGatewayPusher {
        let config = PushGatewayConfig {
            address,
            push_period: period,
        };
        PushGatewayPusher::new(&config, "10.0.0.1", handler(), LogSink::default()).unwrap()
    }

    #[test]
    fn test_push_url() {
        assert_eq!(
            push_url("gateway:9091", "10.1.2.3"),
            "http://gateway:9091/metrics/job/10.1.2.3"
        );
        assert_eq!(
            push_url("https://gateway:9091/", "host a"),
            "https://gateway:9091/metrics/job/host%20a"
        );
        assert_eq!(
            push_url("http://gateway", ""),
            "http://gateway/metrics/job/metercore"
        );
    }

    #[tokio::test]
    async fn test_push_once_puts_exposition() {
        let (addr, received) = fake_gateway().await;
        let pusher = pusher(addr.to_string(), Duration::from_secs(3600));

        pusher.push_once().await.unwrap();

        let received = received.lock().clone();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, "PUT");
        assert_eq!(received[0].1, "/metrics/job/10.0.0.1");
        assert!(received[0].2.contains("pushed_total 1"));
    }

    #[tokio::test]
    async fn test_start_pushes_immediately() {
        let (addr, received) = fake_gateway().await;
        let pusher = pusher(addr.to_string(), Duration::from_secs(3600));

        pusher.start();
        assert!(pusher.is_running());

        for _ in 0..100 {
            if !received.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(received.lock().len(), 1);

        pusher.stop();
        assert!(!pusher.is_running());
    }

    #[test]
    fn test_out_of_range_period_is_rejected() {
        let config = PushGatewayConfig {
            address: "gateway:9091".to_string(),
            push_period: Duration::from_secs(u64::MAX),
        };
        let result = PushGatewayPusher::new(&config, "10.0.0.1", handler(), LogSink::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let pusher = pusher(addr.to_string(), Duration::from_secs(3600));
        assert_matches!(pusher.push_once().await, Err(Error::Push(_)));
    }
}
