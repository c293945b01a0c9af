use crate::instrument::{nop, Counter, Gauge, Histogram, UpDownCounter};
use crate::meter::{InstrumentFactory, Meter};
use crate::server::ExpositionHandler;

/// Meter used when collection is disabled. Always stopped; every instrument
/// it hands out discards its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopMeter;

impl InstrumentFactory for NopMeter {
    fn new_counter(&self, _name: &str, _description: &str, _unit: &str) -> Box<dyn Counter> {
        nop::counter()
    }

    fn new_up_down_counter(
        &self,
        _name: &str,
        _description: &str,
        _unit: &str,
    ) -> Box<dyn UpDownCounter> {
        nop::up_down_counter()
    }

    fn new_gauge(&self, _name: &str, _description: &str, _unit: &str) -> Box<dyn Gauge> {
        nop::gauge()
    }

    fn new_histogram(&self, _name: &str, _description: &str, _unit: &str) -> Box<dyn Histogram> {
        nop::histogram()
    }
}

impl Meter for NopMeter {
    fn handler(&self) -> Option<ExpositionHandler> {
        None
    }

    fn set_running(&self, _on: bool) {}

    fn is_running(&self) -> bool {
        false
    }
}
