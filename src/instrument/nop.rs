//! No-op instruments
//!
//! Zero-sized stand-ins returned while a meter is stopped or when the
//! backend refuses to create an instrument. Boxing a zero-sized type does
//! not allocate, so handing these out is free.

use std::collections::HashMap;

use crate::instrument::{Counter, Gauge, Histogram, UpDownCounter};

#[derive(Debug, Clone, Copy, Default)]
pub struct NopCounter;

#[derive(Debug, Clone, Copy, Default)]
pub struct NopUpDownCounter;

#[derive(Debug, Clone, Copy, Default)]
pub struct NopGauge;

#[derive(Debug, Clone, Copy, Default)]
pub struct NopHistogram;

pub fn counter() -> Box<dyn Counter> {
    Box::new(NopCounter)
}

pub fn up_down_counter() -> Box<dyn UpDownCounter> {
    Box::new(NopUpDownCounter)
}

pub fn gauge() -> Box<dyn Gauge> {
    Box::new(NopGauge)
}

pub fn histogram() -> Box<dyn Histogram> {
    Box::new(NopHistogram)
}

impl Counter for NopCounter {
    fn incr(&self, _delta: f64) {}

    fn incr_one(&self) {}

    fn add_tag(self: Box<Self>, _key: &str, _value: &str) -> Box<dyn Counter> {
        self
    }

    fn with_tags(self: Box<Self>, _tags: &HashMap<String, String>) -> Box<dyn Counter> {
        self
    }
}

impl UpDownCounter for NopUpDownCounter {
    fn update(&self, _delta: f64) {}

    fn incr_one(&self) {}

    fn decr_one(&self) {}

    fn add_tag(self: Box<Self>, _key: &str, _value: &str) -> Box<dyn UpDownCounter> {
        self
    }

    fn with_tags(self: Box<Self>, _tags: &HashMap<String, String>) -> Box<dyn UpDownCounter> {
        self
    }
}

impl Gauge for NopGauge {
    fn update(&self, _value: f64) {}

    fn add_tag(self: Box<Self>, _key: &str, _value: &str) -> Box<dyn Gauge> {
        self
    }

    fn with_tags(self: Box<Self>, _tags: &HashMap<String, String>) -> Box<dyn Gauge> {
        self
    }
}

impl Histogram for NopHistogram {
    fn update_in_seconds(&self, _seconds: f64) {}

    fn update(&self, _duration: std::time::Duration) {}

    fn update_in_milliseconds(&self, _millis: f64) {}

    fn update_since(&self, _start: std::time::Instant) {}

    // The closure is the caller's work, not a measurement: it still runs.
    fn time(&self, f: &mut dyn FnMut()) {
        f();
    }

    fn add_tag(self: Box<Self>, _key: &str, _value: &str) -> Box<dyn Histogram> {
        self
    }

    fn with_tags(self: Box<Self>, _tags: &HashMap<String, String>) -> Box<dyn Histogram> {
        self
    }
}
