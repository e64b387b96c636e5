use parking_lot::Mutex;

use super::{Accumulator, Measurement};
use crate::error::Error;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe in-memory sink.
/// Poll tasks call `add_*()`, the shim drains once the cycle is joined.
#[derive(Default)]
pub struct MetricsCollector {
    inner: Mutex<Inner>,
}

/// Everything accumulated since the last drain.
#[derive(Debug, Default)]
pub struct Gathered {
    pub measurements: Vec<Measurement>,
    pub errors: Vec<Error>,
}

// ─── Internal state ──────────────────────────────────────────────

#[derive(Default)]
struct Inner {
    measurements: Vec<Measurement>,
    errors: Vec<Error>,
}

// ─── MetricsCollector impl ───────────────────────────────────────

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything accumulated so far, leaving the collector empty.
    pub fn drain(&self) -> Gathered {
        let mut inner = self.inner.lock();
        Gathered {
            measurements: std::mem::take(&mut inner.measurements),
            errors: std::mem::take(&mut inner.errors),
        }
    }

    /// Copy of the measurements without draining.
    pub fn measurements(&self) -> Vec<Measurement> {
        self.inner.lock().measurements.clone()
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock();
        inner.measurements.is_empty() && inner.errors.is_empty()
    }
}

impl Accumulator for MetricsCollector {
    fn add_measurement(&self, measurement: Measurement) {
        self.inner.lock().measurements.push(measurement);
    }

    fn add_error(&self, err: Error) {
        self.inner.lock().errors.push(err);
    }
}
