//! Wall-clock abstraction for the batch time gate
//!
//! Timestamps are seconds since the Unix epoch as `f64`, matching the
//! persisted ledger format.

use std::sync::Mutex;

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch
    fn now(&self) -> f64;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}

/// Manually driven clock for tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: Mutex<f64>,
}

impl ManualClock {
    /// Create a clock frozen at `secs`
    pub fn new(secs: f64) -> Self {
        Self {
            secs: Mutex::new(secs),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, secs: f64) {
        let mut now = self.secs.lock().unwrap_or_else(|e| e.into_inner());
        *now += secs;
    }

    /// Jump to an absolute time
    pub fn set(&self, secs: f64) {
        *self.secs.lock().unwrap_or_else(|e| e.into_inner()) = secs;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.secs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}
