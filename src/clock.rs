//! Wall-clock abstraction.
//!
//! Timestamps flow into execution results and response envelopes, so the
//! clock is injected rather than read ambiently. Production uses
//! [`SystemClock`]; tests pin time with [`ManualClock`].

use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Source of wall-clock timestamps.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Advance the clock by the given number of milliseconds.
    pub fn advance_ms(&self, ms: i64) {
        let mut guard = self.now.lock().unwrap();
        *guard += chrono::Duration::milliseconds(ms);
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new("2024-01-01T00:00:00Z".parse().unwrap());
        let before = clock.now();
        clock.advance_ms(1500);
        let after = clock.now();
        assert_eq!((after - before).num_milliseconds(), 1500);
    }
}
