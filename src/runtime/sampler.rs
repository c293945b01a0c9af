use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::{check_interval, MeterConfig};
use crate::meter::InstrumentFactory;
use crate::naming::sanitize_metric_name;
use crate::runtime::{RuntimeMetricSource, RuntimeSample, SampleValue};
use crate::task::BackgroundTask;

/// Description given to every instrument created by the sampler
pub const SYSTEM_METRIC_DESCRIPTION: &str = "system metric";

/// Tag attached to every instrument created by the sampler
pub const METRIC_TYPE_TAG: &str = "metric_type";
pub const BASE_METRIC_TYPE: &str = "base";

struct SamplerInner {
    factory: Arc<dyn InstrumentFactory>,
    source: Arc<dyn RuntimeMetricSource>,
    last_samples: Mutex<Vec<RuntimeSample>>,
}

impl SamplerInner {
    fn collect_once(&self) {
        let samples = self.source.read();
        for sample in &samples {
            self.record(sample);
        }
        *self.last_samples.lock() = samples;
    }

    fn record(&self, sample: &RuntimeSample) {
        let name = sanitize_metric_name(&sample.name);

        match (sample.cumulative, &sample.value) {
            (false, SampleValue::UInt64(value)) => self
                .factory
                .new_gauge(&name, SYSTEM_METRIC_DESCRIPTION, "")
                .add_tag(METRIC_TYPE_TAG, BASE_METRIC_TYPE)
                .update(*value as f64),
            // The raw cumulative reading is added as is, not the change
            // since the previous pass.
            (true, SampleValue::UInt64(value)) => self
                .factory
                .new_counter(&name, SYSTEM_METRIC_DESCRIPTION, "")
                .add_tag(METRIC_TYPE_TAG, BASE_METRIC_TYPE)
                .incr(*value as f64),
            (true, SampleValue::Float64(value)) => self
                .factory
                .new_up_down_counter(&name, SYSTEM_METRIC_DESCRIPTION, "")
                .add_tag(METRIC_TYPE_TAG, BASE_METRIC_TYPE)
                .update(*value),
            _ => trace!(metric = %name, kind = ?sample.value.kind(), "Skipping runtime sample"),
        }
    }
}

/// Periodically reads a [`RuntimeMetricSource`] and records every sample
/// through an [`InstrumentFactory`].
pub struct RuntimeSampler {
    config: Arc<MeterConfig>,
    inner: Arc<SamplerInner>,
    task: BackgroundTask,
}

impl RuntimeSampler {
    pub fn new(
        config: Arc<MeterConfig>,
        factory: Arc<dyn InstrumentFactory>,
        source: Arc<dyn RuntimeMetricSource>,
    ) -> Self {
        Self {
            config,
            inner: Arc::new(SamplerInner {
                factory,
                source,
                last_samples: Mutex::new(Vec::new()),
            }),
            task: BackgroundTask::new("runtime sampler"),
        }
    }

    /// Start the tick loop on the current tokio runtime.
    ///
    /// The first pass runs one full interval after start.
    pub fn start(&self) {
        if !self.config.runtime_metrics_collect {
            self.config
                .write_error("runtime metrics collection is disabled, sampler not started");
            return;
        }

        let period = self.config.runtime_collect_interval;
        if let Err(e) = check_interval("runtime_collect_interval", period) {
            self.config
                .write_error(&format!("failed to start runtime sampler: {}", e));
            return;
        }

        let inner = Arc::clone(&self.inner);

        match self.task.start(|token| Ok(run(inner, period, token))) {
            Ok(true) => self.config.write_info(&format!(
                "runtime sampler started, collecting every {:?}",
                period
            )),
            Ok(false) => self.config.write_info("runtime sampler already running"),
            Err(e) => self
                .config
                .write_error(&format!("failed to start runtime sampler: {}", e)),
        }
    }

    pub fn stop(&self) {
        if self.task.stop() {
            self.config.write_info("runtime sampler stopped");
        } else {
            self.config.write_info("runtime sampler not running");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Run one full collection pass synchronously.
    pub fn collect_once(&self) {
        self.inner.collect_once();
    }

    /// Samples read by the most recent pass
    pub fn last_samples(&self) -> Vec<RuntimeSample> {
        self.inner.last_samples.lock().clone()
    }
}

impl std::fmt::Debug for RuntimeSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeSampler")
            .field("interval", &self.config.runtime_collect_interval)
            .field("running", &self.is_running())
            .finish()
    }
}

async fn run(inner: Arc<SamplerInner>, period: Duration, token: CancellationToken) {
    let start = Instant::now()
        .checked_add(period)
        .unwrap_or_else(Instant::now);
    let mut tick = interval_at(start, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Runtime sampler shutting down");
                break;
            }
            _ = tick.tick() => {
                // Sources may block on file reads.
                let pass = Arc::clone(&inner);
                if let Err(e) = tokio::task::spawn_blocking(move || pass.collect_once()).await {
                    warn!("Runtime collection pass failed: {}", e);
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
