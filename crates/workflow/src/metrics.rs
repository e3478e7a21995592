use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use claims::Decision;

pub struct Metrics {
    // Counters
    total_runs: AtomicUsize,
    approved_runs: AtomicUsize,
    rejected_runs: AtomicUsize,
    retries: AtomicUsize,
    web_fallbacks: AtomicUsize,
    rules_fallbacks: AtomicUsize,
    disagreements: AtomicUsize,
    collaborator_failures: AtomicUsize,
    persistence_failures: AtomicUsize,

    // Timing (in microseconds)
    total_run_time_us: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_runs: AtomicUsize::new(0),
            approved_runs: AtomicUsize::new(0),
            rejected_runs: AtomicUsize::new(0),
            retries: AtomicUsize::new(0),
            web_fallbacks: AtomicUsize::new(0),
            rules_fallbacks: AtomicUsize::new(0),
            disagreements: AtomicUsize::new(0),
            collaborator_failures: AtomicUsize::new(0),
            persistence_failures: AtomicUsize::new(0),
            total_run_time_us: AtomicU64::new(0),
        })
    }

    pub fn record_run(&self, decision: Decision, duration: Duration) {
        self.total_runs.fetch_add(1, Ordering::Relaxed);
        match decision {
            Decision::Approved | Decision::PartiallyApproved => {
                self.approved_runs.fetch_add(1, Ordering::Relaxed);
            }
            Decision::Rejected | Decision::Denied => {
                self.rejected_runs.fetch_add(1, Ordering::Relaxed);
            }
            Decision::Pending | Decision::Error => {}
        }
        self.total_run_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_web_fallback(&self) {
        self.web_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rules_fallback(&self) {
        self.rules_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disagreement(&self) {
        self.disagreements.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_collaborator_failure(&self) {
        self.collaborator_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_runs = self.total_runs.load(Ordering::Relaxed);
        let total_us = self.total_run_time_us.load(Ordering::Relaxed) as f64;
        MetricsSnapshot {
            total_runs,
            approved_runs: self.approved_runs.load(Ordering::Relaxed),
            rejected_runs: self.rejected_runs.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            web_fallbacks: self.web_fallbacks.load(Ordering::Relaxed),
            rules_fallbacks: self.rules_fallbacks.load(Ordering::Relaxed),
            disagreements: self.disagreements.load(Ordering::Relaxed),
            collaborator_failures: self.collaborator_failures.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            avg_run_time_ms: if total_runs > 0 {
                total_us / total_runs as f64 / 1000.0 // Convert to ms
            } else {
                0.0
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_runs: usize,
    pub approved_runs: usize,
    pub rejected_runs: usize,
    pub retries: usize,
    pub web_fallbacks: usize,
    pub rules_fallbacks: usize,
    pub disagreements: usize,
    pub collaborator_failures: usize,
    pub persistence_failures: usize,
    pub avg_run_time_ms: f64,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_averages_run_time() {
        let metrics = Metrics::new();
        metrics.record_run(Decision::Approved, Duration::from_millis(10));
        metrics.record_run(Decision::Denied, Duration::from_millis(30));
        metrics.record_retry();

        let snapshot = metrics.snapshot();

        assert_eq!(snapshot.total_runs, 2);
        assert_eq!(snapshot.approved_runs, 1);
        assert_eq!(snapshot.rejected_runs, 1);
        assert_eq!(snapshot.retries, 1);
        assert!((snapshot.avg_run_time_ms - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_snapshot() {
        assert_eq!(Metrics::new().snapshot().avg_run_time_ms, 0.0);
    }
}
