//! In-process metrics accumulator.
//!
//! # Responsibilities
//! - Named monotonic counters, shared by every request
//! - Bounded latency reservoir for percentile estimates
//! - Point-in-time snapshot for the `/metrics` route
//!
//! # Design Decisions
//! - Counter increments are atomic; the map write lock is taken only the
//!   first time a name is seen
//! - The reservoir is append-only and capped: samples past the cap are
//!   dropped, not replaced, so the cap holds under concurrent writers

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;

/// Counter names used by the dispatch pipeline.
pub const TOTAL: &str = "requests.total";
pub const SUCCESS: &str = "requests.success";
pub const FAILED: &str = "requests.failed";
pub const RETRIED: &str = "requests.retried";
pub const INVALID: &str = "requests.invalid";
pub const BAD_EXECUTOR: &str = "requests.badexecutor";

/// Maximum number of latency samples retained.
pub const MAX_SAMPLES: usize = 10_000;

/// Process-wide metrics state.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,
    latencies: Mutex<Vec<f64>>,
}

/// Aggregated view returned by the `/metrics` route.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub retried: u64,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a named counter by one.
    pub fn increment(&self, name: &str) {
        self.counter(name).fetch_add(1, Ordering::Relaxed);
    }

    /// Current value of a named counter (zero if never incremented).
    pub fn get(&self, name: &str) -> u64 {
        self.counters
            .read()
            .unwrap()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn counter(&self, name: &str) -> Arc<AtomicU64> {
        if let Some(counter) = self.counters.read().unwrap().get(name) {
            return counter.clone();
        }
        let mut counters = self.counters.write().unwrap();
        counters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone()
    }

    /// Append a latency sample in milliseconds.
    ///
    /// Samples beyond [`MAX_SAMPLES`] are dropped; the cap is checked under
    /// the lock so concurrent writers cannot overshoot it.
    pub fn record_latency(&self, ms: f64) {
        let mut samples = self.latencies.lock().unwrap();
        if samples.len() < MAX_SAMPLES {
            samples.push(ms);
        }
    }

    /// Number of retained latency samples.
    pub fn sample_count(&self) -> usize {
        self.latencies.lock().unwrap().len()
    }

    /// Aggregate counters and latency percentiles into a snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let (avg, p95) = {
            let samples = self.latencies.lock().unwrap();
            if samples.is_empty() {
                (0.0, 0.0)
            } else {
                let avg = samples.iter().sum::<f64>() / samples.len() as f64;
                let mut sorted = samples.clone();
                sorted.sort_by(f64::total_cmp);
                // Nearest-rank percentile.
                let rank = ((sorted.len() as f64) * 0.95).ceil() as usize;
                let p95 = sorted[rank.clamp(1, sorted.len()) - 1];
                (avg, p95)
            }
        };

        MetricsSnapshot {
            total: self.get(TOTAL),
            success: self.get(SUCCESS),
            failed: self.get(FAILED),
            retried: self.get(RETRIED),
            avg_latency_ms: avg,
            p95_latency_ms: p95,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_monotonic_and_independent() {
        let registry = MetricsRegistry::new();
        registry.increment(TOTAL);
        registry.increment(TOTAL);
        registry.increment(SUCCESS);

        assert_eq!(registry.get(TOTAL), 2);
        assert_eq!(registry.get(SUCCESS), 1);
        assert_eq!(registry.get(FAILED), 0);
    }

    #[test]
    fn reservoir_respects_cap() {
        let registry = MetricsRegistry::new();
        for i in 0..(MAX_SAMPLES + 100) {
            registry.record_latency(i as f64);
        }
        assert_eq!(registry.sample_count(), MAX_SAMPLES);
    }

    #[test]
    fn reservoir_cap_holds_under_concurrent_writers() {
        let registry = Arc::new(MetricsRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..2_000 {
                    registry.record_latency(i as f64);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.sample_count(), MAX_SAMPLES);
    }

    #[test]
    fn snapshot_computes_percentiles() {
        let registry = MetricsRegistry::new();
        for i in 1..=100 {
            registry.record_latency(i as f64);
        }
        let snapshot = registry.snapshot();
        assert!((snapshot.avg_latency_ms - 50.5).abs() < f64::EPSILON);
        assert_eq!(snapshot.p95_latency_ms, 95.0);
    }

    #[test]
    fn empty_snapshot_is_zeroed() {
        let snapshot = MetricsRegistry::new().snapshot();
        assert_eq!(snapshot.avg_latency_ms, 0.0);
        assert_eq!(snapshot.p95_latency_ms, 0.0);
        assert_eq!(snapshot.total, 0);
    }
}
