//! Dispatch-core metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters shared by the producer and consumer threads of one mode pass
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Events accepted by the core
    submitted: AtomicU64,
    /// Events rejected under `DropNewest`
    dropped: AtomicU64,
    /// Submissions that had to wait for queue space
    backpressure_waits: AtomicU64,
    /// Deepest the pull queue has been
    queue_high_water: AtomicUsize,
    /// Handler invocations (per event or per micro-batch)
    handler_calls: AtomicU64,
}

impl DispatchMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Acquire)
    }

    pub(crate) fn inc_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::AcqRel);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn backpressure_waits(&self) -> u64 {
        self.backpressure_waits.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_backpressure_waits(&self) {
        self.backpressure_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn queue_high_water(&self) -> usize {
        self.queue_high_water.load(Ordering::Relaxed)
    }

    pub(crate) fn observe_queue_depth(&self, depth: usize) {
        self.queue_high_water.fetch_max(depth, Ordering::Relaxed);
    }

    pub fn handler_calls(&self) -> u64 {
        self.handler_calls.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_handler_calls(&self) {
        self.handler_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            submitted: self.submitted(),
            dropped: self.dropped(),
            backpressure_waits: self.backpressure_waits(),
            queue_high_water: self.queue_high_water(),
            handler_calls: self.handler_calls(),
        }
    }
}

/// Snapshot of dispatch metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub submitted: u64,
    pub dropped: u64,
    pub backpressure_waits: u64,
    pub queue_high_water: usize,
    pub handler_calls: u64,
}
