//! Process-wide convenience meter.
//!
//! Starts out as the no-op meter, so code that records before anything is
//! installed never fails. The last installed meter wins.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::meter::{Meter, NopMeter};

static GLOBAL_METER: Lazy<RwLock<Arc<dyn Meter>>> =
    Lazy::new(|| RwLock::new(Arc::new(NopMeter) as Arc<dyn Meter>));

/// Currently installed global meter
pub fn global_meter() -> Arc<dyn Meter> {
    Arc::clone(&*GLOBAL_METER.read())
}

/// Install `meter` as the global meter, returning the previous one.
pub fn set_global_meter(meter: Arc<dyn Meter>) -> Arc<dyn Meter> {
    std::mem::replace(&mut *GLOBAL_METER.write(), meter)
}
