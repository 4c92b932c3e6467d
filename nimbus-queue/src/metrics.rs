//! Queue counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters of a queue
#[derive(Debug, Default)]
pub struct QueueMetrics {
    busy_workers: AtomicU64,
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    canceled: AtomicU64,
    suspending: AtomicU64,
    retried: AtomicU64,
}

/// Point-in-time copy of [`QueueMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub busy_workers: u64,
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub canceled: u64,
    pub suspending: u64,
    pub retried: u64,
}

fn inc(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

// Gauges restored from storage may be decremented before they were counted
fn dec(counter: &AtomicU64) {
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
        Some(v.saturating_sub(1))
    });
}

impl QueueMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) {
        inc(&self.submitted);
    }

    pub fn worker_started(&self) {
        inc(&self.busy_workers);
    }

    pub fn worker_released(&self) {
        dec(&self.busy_workers);
    }

    pub fn suspended(&self) {
        inc(&self.suspending);
    }

    pub fn resumed(&self) {
        dec(&self.suspending);
    }

    pub fn succeeded(&self) {
        inc(&self.succeeded);
    }

    pub fn failed(&self) {
        inc(&self.failed);
    }

    pub fn canceled(&self) {
        inc(&self.canceled);
    }

    pub fn retried(&self) {
        inc(&self.retried);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            busy_workers: self.busy_workers.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            canceled: self.canceled.load(Ordering::Relaxed),
            suspending: self.suspending.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauges_never_underflow() {
        let metrics = QueueMetrics::new();
        metrics.resumed();
        metrics.worker_released();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());

        metrics.worker_started();
        metrics.suspended();
        metrics.submitted();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.busy_workers, 1);
        assert_eq!(snapshot.suspending, 1);
        assert_eq!(snapshot.submitted, 1);
    }
}
