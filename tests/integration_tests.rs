//! metercore Integration Tests
//!
//! End-to-end behavior through the public API:
//! - Instrument factory contract and the activation latch
//! - Meter running toggle
//! - Runtime sampler routing into a Prometheus registry
//! - Configuration loading and the meter factory

use std::sync::Arc;
use std::time::Duration;

use metercore::backend::{InMemoryBackend, PrometheusBackend};
use metercore::meter::MeterCore;
use metercore::{
    ExpositionHandler, InstrumentFactory, Meter, MeterConfig, MeterController,
    MeterProviderType, RuntimeMetricSource, RuntimeSample, SampleValue,
};

fn exposition(meter: &dyn Meter) -> String {
    let exposition = meter.handler().unwrap().render().unwrap();
    String::from_utf8(exposition.body).unwrap()
}

fn prometheus_meter() -> MeterController {
    metercore::new_prometheus_meter(MeterConfig::new()).unwrap()
}

// =============================================================================
// Instrument Factory Tests
// =============================================================================

mod factory_tests {
    use super::*;

    #[test]
    fn test_factory_never_fails() {
        let meter = prometheus_meter();

        for name in ["ok_name", "", "has space", "9starts_with_digit", "dash-ed"] {
            meter.new_counter(name, "d", "").incr_one();
            meter.new_up_down_counter(name, "d", "").decr_one();
            meter.new_gauge(name, "d", "").update(1.0);
            meter.new_histogram(name, "d", "s").update_in_seconds(1.0);
        }

        let text = exposition(&meter);
        assert!(text.contains("ok_name_total 1"));
    }

    #[test]
    fn test_first_call_only_is_forwarded() {
        let meter = prometheus_meter();
        let counter = meter.new_counter("latched", "", "");

        counter.incr_one();
        counter.incr_one();

        assert!(exposition(&meter).contains("latched_total 1"));
    }

    #[test]
    fn test_fresh_instruments_accumulate() {
        let meter = prometheus_meter();

        for _ in 0..3 {
            meter
                .new_counter("hits", "", "")
                .add_tag("route", "/hello")
                .incr_one();
        }

        assert!(exposition(&meter).contains("hits_total{route=\"/hello\"} 3"));
    }

    #[test]
    fn test_histogram_seconds() {
        let config = MeterConfig::new().with_histogram_boundaries(vec![0.1, 1.0]);
        let meter = metercore::new_prometheus_meter(config).unwrap();

        meter
            .new_histogram("request_latency", "", "s")
            .update(Duration::from_millis(250));

        let text = exposition(&meter);
        assert!(text.contains("request_latency_seconds_bucket{le=\"0.1\"} 0"));
        assert!(text.contains("request_latency_seconds_bucket{le=\"1\"} 1"));
        assert!(text.contains("request_latency_seconds_sum 0.25"));
    }
}

// =============================================================================
// Running Toggle Tests
// =============================================================================

mod toggle_tests {
    use super::*;
    use metercore::runtime::ProcessMetricSource;

    #[test]
    fn test_stopped_meter_has_no_backend_effect() {
        let backend = InMemoryBackend::new();
        let core = Arc::new(MeterCore::new(
            Arc::new(MeterConfig::new()),
            Arc::new(backend.clone()),
        ));
        let meter = MeterController::new(core, None, Arc::new(ProcessMetricSource::new()));

        meter.set_running(false);
        let counter = meter.new_counter("ignored", "", "");
        for _ in 0..50 {
            counter.incr_one();
        }

        assert!(backend.is_empty());
    }

    #[test]
    fn test_repeated_start_is_idempotent() {
        let meter = prometheus_meter();

        meter.set_running(true);
        meter.set_running(true);
        assert!(meter.is_running());

        meter.set_running(false);
        meter.set_running(false);
        assert!(!meter.is_running());

        meter.set_running(true);
        assert!(meter.is_running());
    }

    #[test]
    fn test_handler_survives_toggle() {
        let meter = prometheus_meter();
        meter.new_gauge("kept", "", "").update(2.0);

        meter.set_running(false);
        assert!(meter.handler().is_some());
        assert!(exposition(&meter).contains("kept 2"));
    }
}

// =============================================================================
// Runtime Sampler Tests
// =============================================================================

mod sampler_tests {
    use super::*;

    struct FixedSource;

    impl RuntimeMetricSource for FixedSource {
        fn read(&self) -> Vec<RuntimeSample> {
            vec![
                RuntimeSample::gauge("/sched/tasks:tasks", 42),
                RuntimeSample::cumulative_u64("/gc/cycles/automatic:gc-cycles", 5),
                RuntimeSample::cumulative_f64("/cpu/classes/total:cpu-seconds", 1.25),
                RuntimeSample::new("/gc/pauses:seconds", true, SampleValue::Bad),
                RuntimeSample::new("/ratio:percent", false, SampleValue::Float64(0.3)),
            ]
        }
    }

    fn sampled_meter(interval: Duration) -> MeterController {
        let config = Arc::new(
            MeterConfig::new()
                .with_runtime_metrics_collector()
                .with_runtime_collect_interval(interval),
        );
        let backend = PrometheusBackend::from_config(&config).unwrap();
        let handler = ExpositionHandler::new(backend.registry().clone());
        let core = Arc::new(MeterCore::new(config, Arc::new(backend)));
        MeterController::new(core, Some(handler), Arc::new(FixedSource))
    }

    #[test]
    fn test_collect_once_routes_into_registry() {
        let meter = sampled_meter(Duration::from_secs(10));
        meter.sampler().collect_once();

        let text = exposition(&meter);
        assert!(text.contains("sched_tasks_tasks{metric_type=\"base\"} 42"));
        assert!(text.contains("gc_cycles_automatic_gc_cycles_total{metric_type=\"base\"} 5"));
        assert!(text.contains("cpu_classes_total_cpu_seconds{metric_type=\"base\"} 1.25"));
        assert!(!text.contains("gc_pauses"));
        assert!(!text.contains("ratio_percent"));
        assert_eq!(meter.sampler().last_samples().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_drive_collection() {
        let meter = sampled_meter(Duration::from_secs(10));
        meter.start();
        assert!(meter.sampler().is_running());

        tokio::time::sleep(Duration::from_secs(25)).await;
        // Two passes, each adding the raw cumulative reading.
        assert!(exposition(&meter).contains("gc_cycles_automatic_gc_cycles_total{metric_type=\"base\"} 10"));

        meter.set_running(false);
        assert!(!meter.sampler().is_running());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(exposition(&meter).contains("gc_cycles_automatic_gc_cycles_total{metric_type=\"base\"} 10"));
    }
}

// =============================================================================
// Configuration & Factory Tests
// =============================================================================

mod config_tests {
    use super::*;

    #[test]
    fn test_yaml_config_builds_meter() {
        let yaml = r#"
env: test
provider: prometheus
runtime_collect_interval: 30s
histogram_boundaries: [0.5, 1, 5]
base_tags:
  service: checkout
"#;
        let config = MeterConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.runtime_collect_interval, Duration::from_secs(30));
        assert_eq!(config.provider, MeterProviderType::Prometheus);

        let meter = metercore::new_meter(config).unwrap();
        meter.new_counter("orders", "", "").incr(2.0);

        let text = exposition(meter.as_ref());
        assert!(text.contains("orders_total{service=\"checkout\"} 2"));
    }

    #[test]
    fn test_global_meter_is_swappable() {
        assert!(!metercore::global_meter().is_running());

        let meter: Arc<dyn Meter> = Arc::new(prometheus_meter());
        metercore::set_global_meter(Arc::clone(&meter));
        metercore::global_meter()
            .new_counter("global_total", "", "")
            .incr_one();

        assert!(exposition(meter.as_ref()).contains("global_total 1"));
        metercore::set_global_meter(Arc::new(metercore::NopMeter));
    }

    #[test]
    fn test_sanitize_examples() {
        use metercore::sanitize_metric_name;

        let name = sanitize_metric_name("/cpu/classes/gc/mark/assist:cpu-seconds");
        assert_eq!(name, "cpu_classes_gc_mark_assist_cpu_seconds");
        assert_eq!(sanitize_metric_name(&name), name);
        assert_eq!(sanitize_metric_name("1start"), "o_1start");
        assert_eq!(sanitize_metric_name("noChange"), "nochange");
    }

    #[test]
    fn test_tag_serialization_order_independent() {
        use metercore::TagSet;

        let ab: TagSet = [("a", "1"), ("b", "2")].into_iter().collect();
        let ba: TagSet = [("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(ab.serialize(), ba.serialize());
    }
}
