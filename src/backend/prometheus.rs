//! Prometheus Backend
//!
//! Maps instruments onto metric families of a `prometheus::Registry`.
//!
//! # Naming
//!
//! - a non-empty unit is appended as a suffix (`s` becomes `_seconds`,
//!   `By` becomes `_bytes`, ...)
//! - counters gain a `_total` suffix
//!
//! # Labels
//!
//! Tags become labels. The label names of a family are fixed by the first
//! measurement it receives; later measurements with another label-name set
//! are dropped with a warning. Keys starting with `__` are reserved by
//! Prometheus and are escaped with a `key` prefix. Duplicate keys keep the
//! value added last. Base tags from the configuration are attached to every
//! family as constant labels.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};
use tracing::{debug, warn};

use crate::backend::{MetricsBackend, Recorder};
use crate::config::MeterConfig;
use crate::error::{Error, Result};
use crate::instrument::{InstrumentId, InstrumentKind};
use crate::naming::sanitize_metric_name;
use crate::tag::{is_reserved_key, is_valid_key, TagSet};

// =============================================================================
// Backend
// =============================================================================

struct Shared {
    registry: Registry,
    boundaries: Vec<f64>,
    const_labels: HashMap<String, String>,
}

/// Backend registering every instrument in a Prometheus registry
pub struct PrometheusBackend {
    shared: Arc<Shared>,
    families: RwLock<HashMap<String, Arc<Family>>>,
}

impl PrometheusBackend {
    /// Create a backend with explicit histogram boundaries and base tags.
    pub fn new(boundaries: Vec<f64>, base_tags: &BTreeMap<String, String>) -> Result<Self> {
        if boundaries.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(Error::Config(
                "histogram boundaries must be strictly increasing".to_string(),
            ));
        }

        let const_labels: HashMap<String, String> = base_tags
            .iter()
            .map(|(key, value)| (label_name(key), value.clone()))
            .collect();

        Ok(Self {
            shared: Arc::new(Shared {
                registry: Registry::new(),
                boundaries,
                const_labels,
            }),
            families: RwLock::new(HashMap::new()),
        })
    }

    /// Create a backend from the histogram boundaries and base tags of a
    /// configuration.
    pub fn from_config(config: &MeterConfig) -> Result<Self> {
        Self::new(config.histogram_boundaries.clone(), &config.base_tags)
    }

    /// Registry holding every family created by this backend
    pub fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    /// Number of distinct metric families created so far
    pub fn family_count(&self) -> usize {
        self.families.read().len()
    }

    fn family(&self, kind: InstrumentKind, id: &InstrumentId) -> Result<Arc<Family>> {
        let name = exported_name(kind, id);

        if let Some(family) = self.families.read().get(&name) {
            return check_kind(family, kind);
        }

        let mut families = self.families.write();
        let family = families
            .entry(name.clone())
            .or_insert_with(|| {
                debug!(metric = %name, kind = %kind, "Creating prometheus family");
                Arc::new(Family {
                    kind,
                    help: if id.description.is_empty() {
                        id.name.clone()
                    } else {
                        id.description.clone()
                    },
                    name,
                    series: OnceCell::new(),
                })
            })
            .clone();
        check_kind(&family, kind)
    }
}

impl MetricsBackend for PrometheusBackend {
    fn create(&self, kind: InstrumentKind, id: &InstrumentId) -> Result<Arc<dyn Recorder>> {
        if !is_valid_metric_name(&id.name) {
            return Err(Error::InvalidInstrument {
                name: id.name.clone(),
                reason: "metric names must match [a-zA-Z_:][a-zA-Z0-9_:]*".to_string(),
            });
        }

        let family = self.family(kind, id)?;
        Ok(Arc::new(PrometheusRecorder {
            family,
            shared: Arc::clone(&self.shared),
        }))
    }
}

impl std::fmt::Debug for PrometheusBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusBackend")
            .field("boundaries", &self.shared.boundaries)
            .field("const_labels", &self.shared.const_labels)
            .field("families", &self.family_count())
            .finish()
    }
}

// =============================================================================
// Families
// =============================================================================

enum SeriesVec {
    Counter(CounterVec),
    UpDownCounter(GaugeVec),
    Gauge(GaugeVec),
    Histogram(HistogramVec),
}

struct Series {
    label_names: Vec<String>,
    vec: SeriesVec,
}

struct Family {
    kind: InstrumentKind,
    name: String,
    help: String,
    series: OnceCell<Series>,
}

fn check_kind(family: &Arc<Family>, kind: InstrumentKind) -> Result<Arc<Family>> {
    if family.kind != kind {
        return Err(Error::InstrumentConflict {
            name: family.name.clone(),
            existing: family.kind.to_string(),
            requested: kind.to_string(),
        });
    }
    Ok(Arc::clone(family))
}

impl Family {
    fn series(&self, label_names: &[String], shared: &Shared) -> Result<&Series> {
        self.series.get_or_try_init(|| {
            let names: Vec<&str> = label_names.iter().map(String::as_str).collect();
            let opts = Opts::new(self.name.clone(), self.help.clone())
                .const_labels(shared.const_labels.clone());

            let vec = match self.kind {
                InstrumentKind::Counter => {
                    let vec = CounterVec::new(opts, &names)?;
                    shared.registry.register(Box::new(vec.clone()))?;
                    SeriesVec::Counter(vec)
                }
                InstrumentKind::UpDownCounter => {
                    let vec = GaugeVec::new(opts, &names)?;
                    shared.registry.register(Box::new(vec.clone()))?;
                    SeriesVec::UpDownCounter(vec)
                }
                InstrumentKind::Gauge => {
                    let vec = GaugeVec::new(opts, &names)?;
                    shared.registry.register(Box::new(vec.clone()))?;
                    SeriesVec::Gauge(vec)
                }
                InstrumentKind::Histogram => {
                    let opts = HistogramOpts::from(opts).buckets(shared.boundaries.clone());
                    let vec = HistogramVec::new(opts, &names)?;
                    shared.registry.register(Box::new(vec.clone()))?;
                    SeriesVec::Histogram(vec)
                }
            };

            Ok(Series {
                label_names: label_names.to_vec(),
                vec,
            })
        })
    }
}

// =============================================================================
// Recorder
// =============================================================================

struct PrometheusRecorder {
    family: Arc<Family>,
    shared: Arc<Shared>,
}

impl Recorder for PrometheusRecorder {
    fn record(&self, value: f64, tags: &TagSet) {
        let labels = labels_for(tags, &self.shared.const_labels);
        let label_names: Vec<String> = labels.keys().cloned().collect();

        let series = match self.family.series(&label_names, &self.shared) {
            Ok(series) => series,
            Err(e) => {
                warn!(metric = %self.family.name, error = %e, "Failed to register metric family");
                return;
            }
        };

        if series.label_names != label_names {
            warn!(
                metric = %self.family.name,
                expected = ?series.label_names,
                got = ?label_names,
                "Dropping measurement with mismatched label names"
            );
            return;
        }

        let values: Vec<&str> = labels.values().map(String::as_str).collect();
        let result = match &series.vec {
            SeriesVec::Counter(vec) => {
                // Also rejects NaN.
                if !(value >= 0.0) {
                    warn!(metric = %self.family.name, value, "Dropping negative counter delta");
                    return;
                }
                vec.get_metric_with_label_values(values.as_slice())
                    .map(|counter| counter.inc_by(value))
            }
            SeriesVec::UpDownCounter(vec) => vec
                .get_metric_with_label_values(values.as_slice())
                .map(|gauge| gauge.add(value)),
            SeriesVec::Gauge(vec) => vec
                .get_metric_with_label_values(values.as_slice())
                .map(|gauge| gauge.set(value)),
            SeriesVec::Histogram(vec) => vec
                .get_metric_with_label_values(values.as_slice())
                .map(|histogram| histogram.observe(value)),
        };

        if let Err(e) = result {
            warn!(metric = %self.family.name, error = %e, "Failed to record measurement");
        }
    }
}

// =============================================================================
// Naming Helpers
// =============================================================================

/// Check a name against `[a-zA-Z_:][a-zA-Z0-9_:]*`.
fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn unit_suffix(unit: &str) -> String {
    match unit.trim() {
        "" | "1" => String::new(),
        "s" => "seconds".to_string(),
        "ms" => "milliseconds".to_string(),
        "us" => "microseconds".to_string(),
        "ns" => "nanoseconds".to_string(),
        "By" => "bytes".to_string(),
        "KiBy" => "kibibytes".to_string(),
        "MiBy" => "mebibytes".to_string(),
        "%" => "percent".to_string(),
        other => sanitize_metric_name(other),
    }
}

fn exported_name(kind: InstrumentKind, id: &InstrumentId) -> String {
    let mut name = id.name.clone();

    let unit = unit_suffix(&id.unit);
    if !unit.is_empty() && !name.ends_with(&format!("_{}", unit)) {
        name.push('_');
        name.push_str(&unit);
    }

    if kind == InstrumentKind::Counter && !name.ends_with("_total") {
        name.push_str("_total");
    }

    name
}

/// Map a tag key onto a legal, non-reserved label name.
fn label_name(key: &str) -> String {
    if is_valid_key(key) && !is_reserved_key(key) {
        return key.to_string();
    }

    let mut name: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "key_");
    } else if is_reserved_key(&name) {
        name.insert_str(0, "key");
    }
    name
}

/// Labels of one measurement, sorted by name. Base tags win over
/// measurement tags of the same name.
fn labels_for(tags: &TagSet, const_labels: &HashMap<String, String>) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    for tag in tags {
        let name = label_name(&tag.key);
        if const_labels.contains_key(&name) {
            continue;
        }
        labels.insert(name, tag.value.clone());
    }
    labels
}

// =============================================================================
// Tests
// =============================================================================
