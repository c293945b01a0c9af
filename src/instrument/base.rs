//! State shared by every live instrument

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::instrument::InstrumentId;
use crate::tag::TagSet;

/// Identity, tags and the activation latch of one instrument.
///
/// The latch starts inactive and is flipped exactly once. Live instruments
/// forward a measurement only when [`activate`](Self::activate) returns
/// `true`, so each instance forwards its first recording and silently drops
/// every later one. Long-lived instruments therefore report a single value;
/// callers that record repeatedly must create a fresh instrument per
/// measurement, as the runtime sampler does.
#[derive(Debug)]
pub struct InstrumentBase {
    id: InstrumentId,
    tags: TagSet,
    activated: AtomicBool,
}

impl InstrumentBase {
    pub fn new(id: InstrumentId) -> Self {
        Self {
            id,
            tags: TagSet::new(),
            activated: AtomicBool::new(false),
        }
    }

    /// Flip the latch. Returns whether this call performed the flip.
    pub fn activate(&self) -> bool {
        self.activated
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_active(&self) -> bool {
        self.activated.load(Ordering::Acquire)
    }

    pub fn add_tag(&mut self, key: &str, value: &str) {
        self.tags.add(key, value);
    }

    pub fn with_tags(&mut self, tags: &HashMap<String, String>) {
        self.tags.merge(tags);
    }

    pub fn id(&self) -> &InstrumentId {
        &self.id
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }
}
