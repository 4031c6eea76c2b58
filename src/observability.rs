//! Logger counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated from the write path, the worker, and the pruner
#[derive(Debug, Default)]
pub struct Metrics {
    entries_accepted: AtomicU64,
    entries_filtered: AtomicU64,
    entries_dropped: AtomicU64,
    write_failures: AtomicU64,
    prune_sweeps: AtomicU64,
    prune_failures: AtomicU64,
    entries_pruned: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_accepted(&self) {
        self.entries_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn entry_filtered(&self) {
        self.entries_filtered.fetch_add(1, Ordering::Relaxed);
    }

    /// Write submitted while the logger was not open
    pub fn entry_dropped(&self) {
        self.entries_dropped.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "entries_dropped", "Metric incremented");
    }

    pub fn write_failed(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "write_failures", "Metric incremented");
    }

    pub fn prune_completed(&self, removed: usize) {
        self.prune_sweeps.fetch_add(1, Ordering::Relaxed);
        self.entries_pruned
            .fetch_add(removed as u64, Ordering::Relaxed);
    }

    pub fn prune_failed(&self) {
        self.prune_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "prune_failures", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            entries_accepted: self.entries_accepted.load(Ordering::Relaxed),
            entries_filtered: self.entries_filtered.load(Ordering::Relaxed),
            entries_dropped: self.entries_dropped.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            prune_sweeps: self.prune_sweeps.load(Ordering::Relaxed),
            prune_failures: self.prune_failures.load(Ordering::Relaxed),
            entries_pruned: self.entries_pruned.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub entries_accepted: u64,
    pub entries_filtered: u64,
    pub entries_dropped: u64,
    pub write_failures: u64,
    pub prune_sweeps: u64,
    pub prune_failures: u64,
    pub entries_pruned: u64,
}
