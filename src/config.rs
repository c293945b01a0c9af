//! Meter configuration
//!
//! A [`MeterConfig`] is an immutable snapshot once a meter has been built
//! from it. It can be assembled with the `with_*` builder methods or loaded
//! from YAML.
//!
//! ```yaml
//! env: production
//! provider: prometheus
//! prometheus_port: 9464
//! runtime_metrics_collect: true
//! runtime_collect_interval: 10s
//! push_gateway:
//!   address: http://pushgateway:9091
//!   push_period: 30s
//! base_tags:
//!   service: checkout
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Default interval between two runtime metric collection passes
pub const DEFAULT_RUNTIME_COLLECT_INTERVAL: Duration = Duration::from_secs(10);

/// Default explicit histogram bucket boundaries
pub const DEFAULT_HISTOGRAM_BOUNDARIES: [f64; 15] = [
    0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 750.0, 1000.0, 2500.0, 5000.0, 7500.0,
    10000.0,
];

/// Longest accepted collection or push interval
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

const LOG_PREFIX: &str = "[metercore]";

// =============================================================================
// Enums
// =============================================================================

/// Deployment environment of the instrumented process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterEnv {
    #[default]
    Production,
    Test,
    Dev,
}

impl fmt::Display for MeterEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeterEnv::Production => write!(f, "production"),
            MeterEnv::Test => write!(f, "test"),
            MeterEnv::Dev => write!(f, "dev"),
        }
    }
}

impl std::str::FromStr for MeterEnv {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "production" | "product" | "prod" => Ok(MeterEnv::Production),
            "test" => Ok(MeterEnv::Test),
            "dev" => Ok(MeterEnv::Dev),
            other => Err(Error::Config(format!("unknown meter env: {}", other))),
        }
    }
}

/// Which backend a meter is built on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterProviderType {
    /// No backend; the factory hands out a no-op meter
    #[default]
    None,
    Prometheus,
}

// =============================================================================
// Push Gateway
// =============================================================================

/// Push gateway settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PushGatewayConfig {
    /// Gateway base address, e.g. `http://pushgateway:9091`
    pub address: String,

    /// Interval between two pushes
    #[serde(deserialize_with = "deserialize_duration")]
    pub push_period: Duration,
}

// =============================================================================
// Log Sinks
// =============================================================================

/// Injected log writer
pub type LogWriter = Arc<dyn Fn(&str) + Send + Sync>;

/// Optional info/error writers. Unset writers fall back to `tracing`.
#[derive(Clone, Default)]
pub struct LogSink {
    info: Option<LogWriter>,
    error: Option<LogWriter>,
}

impl LogSink {
    pub fn write_info(&self, msg: &str) {
        match &self.info {
            Some(write) => write(&format!("{} {}", LOG_PREFIX, msg)),
            None => tracing::info!("{} {}", LOG_PREFIX, msg),
        }
    }

    pub fn write_error(&self, msg: &str) {
        match &self.error {
            Some(write) => write(&format!("{} {}", LOG_PREFIX, msg)),
            None => tracing::error!("{} {}", LOG_PREFIX, msg),
        }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("info", &self.info.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

// =============================================================================
// Meter Configuration
// =============================================================================

/// Configuration consumed at meter and sampler construction
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Deployment environment; `dev` always yields a no-op meter
    pub env: MeterEnv,

    /// Backend selection
    pub provider: MeterProviderType,

    /// Port of the exposition HTTP server (0 disables it)
    pub prometheus_port: u16,

    /// Local address, used as the push gateway job name
    pub local_ip: String,

    /// Push gateway settings (disabled when absent)
    pub push_gateway: Option<PushGatewayConfig>,

    /// Enable the runtime metric sampler
    pub runtime_metrics_collect: bool,

    /// Interval between runtime collection passes
    #[serde(deserialize_with = "deserialize_duration")]
    pub runtime_collect_interval: Duration,

    /// Explicit histogram bucket boundaries
    pub histogram_boundaries: Vec<f64>,

    /// Tags attached to every exported series
    pub base_tags: BTreeMap<String, String>,

    /// Log writers
    #[serde(skip)]
    pub log: LogSink,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            env: MeterEnv::default(),
            provider: MeterProviderType::default(),
            prometheus_port: 0,
            local_ip: String::new(),
            push_gateway: None,
            runtime_metrics_collect: false,
            runtime_collect_interval: DEFAULT_RUNTIME_COLLECT_INTERVAL,
            histogram_boundaries: DEFAULT_HISTOGRAM_BOUNDARIES.to_vec(),
            base_tags: BTreeMap::new(),
            log: LogSink::default(),
        }
    }
}

impl MeterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: MeterConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Reject settings no meter can be built from
    pub fn validate(&self) -> Result<()> {
        check_interval("runtime_collect_interval", self.runtime_collect_interval)?;
        if let Some(push) = &self.push_gateway {
            if push.address.trim().is_empty() {
                return Err(Error::Config("push gateway address is empty".to_string()));
            }
            check_interval("push gateway push_period", push.push_period)?;
        }
        if self
            .histogram_boundaries
            .windows(2)
            .any(|pair| pair[0] >= pair[1])
        {
            return Err(Error::Config(
                "histogram boundaries must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_dev(&self) -> bool {
        self.env == MeterEnv::Dev
    }

    pub fn write_info(&self, msg: &str) {
        self.log.write_info(msg);
    }

    pub fn write_error(&self, msg: &str) {
        self.log.write_error(msg);
    }

    // -------------------------------------------------------------------------
    // Builder
    // -------------------------------------------------------------------------

    pub fn with_env(mut self, env: MeterEnv) -> Self {
        self.env = env;
        self
    }

    pub fn with_provider(mut self, provider: MeterProviderType) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_prometheus_port(mut self, port: u16) -> Self {
        self.prometheus_port = port;
        self
    }

    /// Set the local address and exposition port together
    pub fn with_report_metric(mut self, local_ip: impl Into<String>, port: u16) -> Self {
        self.local_ip = local_ip.into();
        self.prometheus_port = port;
        self
    }

    pub fn with_push_gateway(mut self, address: impl Into<String>, period: Duration) -> Self {
        self.push_gateway = Some(PushGatewayConfig {
            address: address.into(),
            push_period: period,
        });
        self
    }

    pub fn with_runtime_metrics_collector(mut self) -> Self {
        self.runtime_metrics_collect = true;
        self
    }

    pub fn with_runtime_collect_interval(mut self, interval: Duration) -> Self {
        self.runtime_collect_interval = interval;
        self
    }

    pub fn with_histogram_boundaries(mut self, boundaries: Vec<f64>) -> Self {
        self.histogram_boundaries = boundaries;
        self
    }

    pub fn with_base_tags<I, K, V>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.base_tags = tags
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn with_info_log_write(mut self, write: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.log.info = Some(Arc::new(write));
        self
    }

    pub fn with_error_log_write(mut self, write: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.log.error = Some(Arc::new(write));
        self
    }
}

// =============================================================================
// Duration Parsing
// =============================================================================

/// Parse a duration string like "10s", "500ms", "2m", "1h30m".
///
/// A trailing bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::DurationParse("empty duration string".to_string()));
    }

    let mut total_ms: u64 = 0;
    let mut num_buf = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            num_buf.push(c);
            continue;
        }

        let num: u64 = num_buf
            .parse()
            .map_err(|_| Error::DurationParse(format!("invalid number in duration: {}", s)))?;
        num_buf.clear();

        let multiplier = match c {
            'h' | 'H' => 3_600_000,
            'm' | 'M' if chars.peek() == Some(&'s') => {
                chars.next();
                1
            }
            'm' | 'M' => 60_000,
            's' | 'S' => 1_000,
            'd' | 'D' => 86_400_000,
            _ => {
                return Err(Error::DurationParse(format!(
                    "unknown duration unit: {}",
                    c
                )))
            }
        };

        total_ms = accumulate(total_ms, num, multiplier, s)?;
    }

    if !num_buf.is_empty() {
        let num: u64 = num_buf
            .parse()
            .map_err(|_| Error::DurationParse(format!("invalid number in duration: {}", s)))?;
        total_ms = accumulate(total_ms, num, 1_000, s)?;
    }

    Ok(Duration::from_millis(total_ms))
}

fn accumulate(total_ms: u64, num: u64, multiplier: u64, input: &str) -> Result<u64> {
    num.checked_mul(multiplier)
        .and_then(|ms| total_ms.checked_add(ms))
        .ok_or_else(|| Error::DurationParse(format!("duration out of range: {}", input)))
}

/// Reject a zero interval or one longer than [`MAX_INTERVAL`].
pub(crate) fn check_interval(field: &str, interval: Duration) -> Result<()> {
    if interval.is_zero() {
        return Err(Error::Config(format!("{} must be greater than zero", field)));
    }
    if interval > MAX_INTERVAL {
        return Err(Error::Config(format!(
            "{} of {:?} exceeds the maximum of {:?}",
            field, interval, MAX_INTERVAL
        )));
    }
    Ok(())
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;

    #[test]
    fn test_defaults() {
        let config = MeterConfig::default();
        assert_eq!(config.env, MeterEnv::Production);
        assert_eq!(config.provider, MeterProviderType::None);
        assert_eq!(config.prometheus_port, 0);
        assert!(config.push_gateway.is_none());
        assert!(!config.runtime_metrics_collect);
        assert_eq!(config.runtime_collect_interval, Duration::from_secs(10));
        assert_eq!(config.histogram_boundaries.len(), 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = MeterConfig::new()
            .with_env(MeterEnv::Test)
            .with_provider(MeterProviderType::Prometheus)
            .with_report_metric("10.0.0.7", 16666)
            .with_push_gateway("http://gw:9091", Duration::from_secs(15))
            .with_runtime_metrics_collector()
            .with_histogram_boundaries(vec![0.1, 1.0])
            .with_base_tags([("service", "checkout")]);

        assert_eq!(config.env, MeterEnv::Test);
        assert_eq!(config.provider, MeterProviderType::Prometheus);
        assert_eq!(config.local_ip, "10.0.0.7");
        assert_eq!(config.prometheus_port, 16666);
        assert_eq!(
            config.push_gateway,
            Some(PushGatewayConfig {
                address: "http://gw:9091".to_string(),
                push_period: Duration::from_secs(15),
            })
        );
        assert!(config.runtime_metrics_collect);
        assert_eq!(config.histogram_boundaries, vec![0.1, 1.0]);
        assert_eq!(config.base_tags.get("service").map(String::as_str), Some("checkout"));
        assert!(!config.is_dev());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
env: dev
provider: prometheus
prometheus_port: 9464
runtime_metrics_collect: true
runtime_collect_interval: 500ms
push_gateway:
  address: http://gw:9091
  push_period: 2m
base_tags:
  region: eu
"#;
        let config = MeterConfig::from_yaml_str(yaml).unwrap();
        assert!(config.is_dev());
        assert_eq!(config.provider, MeterProviderType::Prometheus);
        assert_eq!(config.prometheus_port, 9464);
        assert_eq!(config.runtime_collect_interval, Duration::from_millis(500));
        assert_eq!(
            config.push_gateway.as_ref().map(|p| p.push_period),
            Some(Duration::from_secs(120))
        );
        assert_eq!(config.base_tags.len(), 1);
    }

    #[test]
    fn test_from_yaml_numeric_duration_is_seconds() {
        let config = MeterConfig::from_yaml_str("runtime_collect_interval: 3").unwrap();
        assert_eq!(config.runtime_collect_interval, Duration::from_secs(3));
    }

    #[test]
    fn test_from_yaml_rejects_bad_boundaries() {
        let result = MeterConfig::from_yaml_str("histogram_boundaries: [5.0, 1.0]");
        assert_matches!(result, Err(Error::Config(_)));
    }

    #[test]
    fn test_from_yaml_rejects_unknown_env() {
        let result = MeterConfig::from_yaml_str("env: staging");
        assert_matches!(result, Err(Error::Yaml(_)));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert_matches!(parse_duration(""), Err(Error::DurationParse(_)));
        assert_matches!(parse_duration("5x"), Err(Error::DurationParse(_)));
    }

    #[test]
    fn test_parse_duration_overflow_is_an_error() {
        assert_matches!(
            parse_duration("9999999999999999h"),
            Err(Error::DurationParse(_))
        );
        assert_matches!(
            parse_duration("18446744073709551615"),
            Err(Error::DurationParse(_))
        );
        assert_matches!(
            parse_duration("18446744073709551615ms1ms"),
            Err(Error::DurationParse(_))
        );
    }

    #[test]
    fn test_validate_rejects_out_of_range_intervals() {
        let yaml = "runtime_collect_interval: 18446744073709551615";
        assert_matches!(MeterConfig::from_yaml_str(yaml), Err(Error::Config(_)));

        let config = MeterConfig::new().with_runtime_collect_interval(MAX_INTERVAL);
        assert!(config.validate().is_ok());

        let config = MeterConfig::new()
            .with_runtime_collect_interval(MAX_INTERVAL + Duration::from_secs(1));
        assert_matches!(config.validate(), Err(Error::Config(_)));

        let config = MeterConfig::new().with_runtime_collect_interval(Duration::ZERO);
        assert_matches!(config.validate(), Err(Error::Config(_)));
    }

    #[test]
    fn test_env_from_str() {
        assert_eq!("dev".parse::<MeterEnv>().unwrap(), MeterEnv::Dev);
        assert_eq!("Production".parse::<MeterEnv>().unwrap(), MeterEnv::Production);
        assert!("qa".parse::<MeterEnv>().is_err());
    }

    #[test]
    fn test_injected_log_writers() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let info_lines = Arc::clone(&lines);
        let error_lines = Arc::clone(&lines);
        let config = MeterConfig::new()
            .with_info_log_write(move |s| info_lines.lock().push(format!("info:{}", s)))
            .with_error_log_write(move |s| error_lines.lock().push(format!("error:{}", s)));

        config.write_info("hello");
        config.write_error("boom");

        assert_eq!(
            *lines.lock(),
            vec![
                "info:[metercore] hello".to_string(),
                "error:[metercore] boom".to_string()
            ]
        );
    }
}
