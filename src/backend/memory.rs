//! In-memory backend for testing.
//!
//! Keeps every forwarded measurement for later inspection.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::{MetricsBackend, Recorder};
use crate::error::{Error, Result};
use crate::instrument::{InstrumentId, InstrumentKind};
use crate::tag::TagSet;

/// One measurement as seen by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMeasurement {
    pub kind: InstrumentKind,
    pub name: String,
    pub value: f64,
    pub tags: TagSet,
}

#[derive(Debug, Default)]
struct Shared {
    measurements: RwLock<Vec<RecordedMeasurement>>,
    created: RwLock<Vec<(InstrumentKind, InstrumentId)>>,
    rejected: RwLock<HashSet<String>>,
}

/// Backend collecting measurements in memory.
///
/// Cloning shares the underlying storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    shared: Arc<Shared>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make instrument creation fail for `name`.
    pub fn reject(&self, name: impl Into<String>) {
        self.shared.rejected.write().insert(name.into());
    }

    /// All measurements, in arrival order.
    pub fn measurements(&self) -> Vec<RecordedMeasurement> {
        self.shared.measurements.read().clone()
    }

    /// Values recorded for one instrument name.
    pub fn values(&self, name: &str) -> Vec<f64> {
        self.shared
            .measurements
            .read()
            .iter()
            .filter(|m| m.name == name)
            .map(|m| m.value)
            .collect()
    }

    /// Measurements of one kind.
    pub fn measurements_of_kind(&self, kind: InstrumentKind) -> Vec<RecordedMeasurement> {
        self.shared
            .measurements
            .read()
            .iter()
            .filter(|m| m.kind == kind)
            .cloned()
            .collect()
    }

    /// Instruments successfully created so far.
    pub fn created(&self) -> Vec<(InstrumentKind, InstrumentId)> {
        self.shared.created.read().clone()
    }

    pub fn len(&self) -> usize {
        self.shared.measurements.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.measurements.read().is_empty()
    }

    pub fn clear(&self) {
        self.shared.measurements.write().clear();
        self.shared.created.write().clear();
    }
}

impl MetricsBackend for InMemoryBackend {
    fn create(&self, kind: InstrumentKind, id: &InstrumentId) -> Result<Arc<dyn Recorder>> {
        if self.shared.rejected.read().contains(&id.name) {
            return Err(Error::InvalidInstrument {
                name: id.name.clone(),
                reason: "rejected by in-memory backend".to_string(),
            });
        }
        self.shared.created.write().push((kind, id.clone()));
        Ok(Arc::new(InMemoryRecorder {
            kind,
            name: id.name.clone(),
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct InMemoryRecorder {
    kind: InstrumentKind,
    name: String,
    shared: Arc<Shared>,
}

impl Recorder for InMemoryRecorder {
    fn record(&self, value: f64, tags: &TagSet) {
        self.shared.measurements.write().push(RecordedMeasurement {
            kind: self.kind,
            name: self.name.clone(),
            value,
            tags: tags.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_and_clears() {
        let backend = InMemoryBackend::new();
        let recorder = backend
            .create(InstrumentKind::Gauge, &InstrumentId::new("g", "", ""))
            .unwrap();

        recorder.record(1.0, &TagSet::new());
        recorder.record(2.0, &TagSet::new());

        assert_eq!(backend.values("g"), vec![1.0, 2.0]);
        assert_eq!(backend.measurements_of_kind(InstrumentKind::Gauge).len(), 2);
        assert_eq!(backend.created().len(), 1);

        backend.clear();
        assert!(backend.is_empty());
    }

    #[test]
    fn test_rejected_name_fails_creation() {
        let backend = InMemoryBackend::new();
        backend.reject("bad");

        let result = backend.create(InstrumentKind::Counter, &InstrumentId::new("bad", "", ""));
        assert!(matches!(result, Err(Error::InvalidInstrument { .. })));
        assert!(backend.created().is_empty());
    }
}
