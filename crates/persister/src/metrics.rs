//! Persister metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Bulk-write counters for one store
#[derive(Debug, Default)]
pub struct PersisterMetrics {
    bulk_writes: AtomicU64,
    rows_written: AtomicU64,
    duplicates_ignored: AtomicU64,
    failures: AtomicU64,
}

impl PersisterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one committed batch
    pub fn record_write(&self, batch_len: usize, inserted: usize) {
        self.bulk_writes.fetch_add(1, Ordering::Relaxed);
        self.rows_written
            .fetch_add(inserted as u64, Ordering::Relaxed);
        self.duplicates_ignored
            .fetch_add(batch_len.saturating_sub(inserted) as u64, Ordering::Relaxed);
    }

    /// Record one rolled-back batch
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bulk_writes(&self) -> u64 {
        self.bulk_writes.load(Ordering::Relaxed)
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written.load(Ordering::Relaxed)
    }

    pub fn duplicates_ignored(&self) -> u64 {
        self.duplicates_ignored.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> PersisterSnapshot {
        PersisterSnapshot {
            bulk_writes: self.bulk_writes(),
            rows_written: self.rows_written(),
            duplicates_ignored: self.duplicates_ignored(),
            failures: self.failures(),
        }
    }
}

/// Snapshot of persister metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersisterSnapshot {
    pub bulk_writes: u64,
    pub rows_written: u64,
    pub duplicates_ignored: u64,
    pub failures: u64,
}

impl PersisterSnapshot {
    /// Sum of several stores' snapshots
    pub fn merge(self, other: Self) -> Self {
        Self {
            bulk_writes: self.bulk_writes + other.bulk_writes,
            rows_written: self.rows_written + other.rows_written,
            duplicates_ignored: self.duplicates_ignored + other.duplicates_ignored,
            failures: self.failures + other.failures,
        }
    }
}
