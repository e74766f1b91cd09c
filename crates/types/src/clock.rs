//! Clock service supplying registration timestamps.
//!
//! The registry never takes a timestamp from a caller; it asks an injected
//! clock at commit time so callers cannot spoof registration times.

use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now" in microseconds since UNIX_EPOCH.
pub trait Clock: Send + Sync {
    fn now_us(&self) -> u64;
}

/// System clock clamped to be non-decreasing across calls.
///
/// A wall-clock step backwards (NTP correction, VM migration) would otherwise
/// let a later registration carry an earlier timestamp.
#[derive(Debug, Default)]
pub struct SystemClock {
    last_us: Mutex<u64>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now_us(&self) -> u64 {
        let system_now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64;

        let mut last = self.last_us.lock();
        let now = system_now.max(*last);
        *last = now;
        now
    }
}

/// Hand-stepped clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    now_us: Mutex<u64>,
}

impl ManualClock {
    pub fn new(start_us: u64) -> Self {
        Self {
            now_us: Mutex::new(start_us),
        }
    }

    pub fn set(&self, now_us: u64) {
        *self.now_us.lock() = now_us;
    }

    pub fn advance(&self, delta_us: u64) {
        let mut now = self.now_us.lock();
        *now = now.saturating_add(delta_us);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        *self.now_us.lock()
    }
}
