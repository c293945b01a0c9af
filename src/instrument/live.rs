//! Live instruments
//!
//! Thin wrappers pairing an [`InstrumentBase`] with the backend recorder of
//! the matching kind. Every recording call passes through the activation
//! latch first.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::backend::Recorder;
use crate::instrument::{
    Counter, Gauge, Histogram, InstrumentBase, InstrumentId, UpDownCounter,
};

macro_rules! live_instrument {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name {
            base: InstrumentBase,
            recorder: Arc<dyn Recorder>,
        }

        impl $name {
            pub fn new(id: InstrumentId, recorder: Arc<dyn Recorder>) -> Self {
                Self {
                    base: InstrumentBase::new(id),
                    recorder,
                }
            }

            pub fn base(&self) -> &InstrumentBase {
                &self.base
            }

            fn forward(&self, value: f64) {
                if !self.base.activate() {
                    return;
                }
                self.recorder.record(value, self.base.tags());
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("id", self.base.id())
                    .field("tags", &self.base.tags().serialize())
                    .field("active", &self.base.is_active())
                    .finish()
            }
        }
    };
}

live_instrument!(
    /// Counter forwarding to a backend recorder
    LiveCounter
);
live_instrument!(
    /// Up/down counter forwarding to a backend recorder
    LiveUpDownCounter
);
live_instrument!(
    /// Gauge forwarding to a backend recorder
    LiveGauge
);
live_instrument!(
    /// Histogram forwarding to a backend recorder
    LiveHistogram
);

impl Counter for LiveCounter {
    fn incr(&self, delta: f64) {
        self.forward(delta);
    }

    fn add_tag(mut self: Box<Self>, key: &str, value: &str) -> Box<dyn Counter> {
        self.base.add_tag(key, value);
        self
    }

    fn with_tags(mut self: Box<Self>, tags: &HashMap<String, String>) -> Box<dyn Counter> {
        self.base.with_tags(tags);
        self
    }
}

impl UpDownCounter for LiveUpDownCounter {
    fn update(&self, delta: f64) {
        self.forward(delta);
    }

    fn add_tag(mut self: Box<Self>, key: &str, value: &str) -> Box<dyn UpDownCounter> {
        self.base.add_tag(key, value);
        self
    }

    fn with_tags(mut self: Box<Self>, tags: &HashMap<String, String>) -> Box<dyn UpDownCounter> {
        self.base.with_tags(tags);
        self
    }
}

impl Gauge for LiveGauge {
    fn update(&self, value: f64) {
        self.forward(value);
    }

    fn add_tag(mut self: Box<Self>, key: &str, value: &str) -> Box<dyn Gauge> {
        self.base.add_tag(key, value);
        self
    }

    fn with_tags(mut self: Box<Self>, tags: &HashMap<String, String>) -> Box<dyn Gauge> {
        self.base.with_tags(tags);
        self
    }
}

impl Histogram for LiveHistogram {
    fn update_in_seconds(&self, seconds: f64) {
        self.forward(seconds);
    }

    fn add_tag(mut self: Box<Self>, key: &str, value: &str) -> Box<dyn Histogram> {
        self.base.add_tag(key, value);
        self
    }

    fn with_tags(mut self: Box<Self>, tags: &HashMap<String, String>) -> Box<dyn Histogram> {
        self.base.with_tags(tags);
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
