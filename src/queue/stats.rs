//! Process-wide queue counters.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::models::QueueStatsSnapshot;

/// Counters mutated by the workers and the batch aggregator, read by the
/// stats boundary. Lives for the queue's lifetime and is never persisted.
#[derive(Debug, Default)]
pub struct QueueStats {
    processed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    batched: AtomicU64,
    current_size: AtomicI64,
}

impl QueueStats {
    /// Records `count` successful deliveries.
    pub fn add_processed(&self, count: u64) {
        self.processed.fetch_add(count, Ordering::Relaxed);
    }

    /// Records one delivery failure.
    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one retry scheduling.
    pub fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    /// Records `count` alerts delivered through the batch path.
    pub fn add_batched(&self, count: u64) {
        self.batched.fetch_add(count, Ordering::Relaxed);
    }

    /// Records an alert entering the work channel.
    pub fn increment_size(&self) {
        self.current_size.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an alert leaving the work channel. The size never goes
    /// negative.
    pub fn decrement_size(&self) {
        let previous = self.current_size.fetch_sub(1, Ordering::Relaxed);
        if previous <= 0 {
            self.current_size.store(0, Ordering::Relaxed);
        }
    }

    /// A point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            batched: self.batched.load(Ordering::Relaxed),
            current_size: self.current_size.load(Ordering::Relaxed).max(0) as u64,
        }
    }
}
