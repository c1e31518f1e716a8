//! BatchWriter - shared flush contract of pull and push consumers

use std::thread;
use std::time::Instant;

use contracts::{DispatchMode, Event, EventSink, RetryPolicy};
use observability::{record_batch_flushed, record_flush_failed, record_flush_retry, RunningStats};
use tracing::{debug, error, warn};

use crate::error::ConsumerError;

/// Flush counters of one consumer
#[derive(Debug, Clone, Default)]
pub struct FlushStats {
    /// Events taken in
    pub accepted: u64,
    /// Events in successfully persisted batches
    pub persisted: u64,
    /// Successful non-empty bulk writes
    pub bulk_writes: u64,
    /// Failed attempts that were retried
    pub retries: u64,
    /// Successful flush latency
    pub flush_latency_ms: RunningStats,
}

/// Accumulates events and persists them in bulk
///
/// Invariant: `pending.len() <= batch_size`.
pub struct BatchWriter<S: EventSink> {
    sink: S,
    mode: DispatchMode,
    batch_size: usize,
    retry: RetryPolicy,
    pending: Vec<Event>,
    stats: FlushStats,
}

impl<S: EventSink> BatchWriter<S> {
    pub fn new(sink: S, mode: DispatchMode, batch_size: usize, retry: RetryPolicy) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            mode,
            batch_size,
            retry,
            pending: Vec::with_capacity(batch_size),
            stats: FlushStats::default(),
        }
    }

    /// Take one event, flushing as soon as the batch is full
    pub fn accept(&mut self, event: Event) -> Result<(), ConsumerError> {
        self.pending.push(event);
        self.stats.accepted += 1;
        if self.is_full() {
            self.flush()?;
        }
        Ok(())
    }

    /// Take events without going over the threshold
    ///
    /// Flushes every time the batch fills.
    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) -> Result<(), ConsumerError> {
        for event in events {
            self.accept(event)?;
        }
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.batch_size
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Room left before the batch is full
    pub fn remaining_capacity(&self) -> usize {
        self.batch_size.saturating_sub(self.pending.len())
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn stats(&self) -> &FlushStats {
        &self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Persist the pending batch, retrying per the policy
    ///
    /// An empty batch is a no-op. On final failure the batch stays pending.
    pub fn flush(&mut self) -> Result<(), ConsumerError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let start = Instant::now();
            match self.sink.persist(&self.pending) {
                Ok(()) => {
                    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
                    let rows = self.pending.len();
                    self.stats.persisted += rows as u64;
                    self.stats.bulk_writes += 1;
                    self.stats.flush_latency_ms.push(latency_ms);
                    record_batch_flushed(self.mode, rows, latency_ms);
                    debug!(
                        sink = self.sink.name(),
                        mode = %self.mode,
                        rows,
                        attempt,
                        latency_ms,
                        "batch flushed"
                    );
                    self.pending.clear();
                    return Ok(());
                }
                Err(e) if attempt < max_attempts && e.is_retryable() => {
                    warn!(
                        sink = self.sink.name(),
                        mode = %self.mode,
                        attempt,
                        max_attempts,
                        error = %e,
                        "flush failed, retrying"
                    );
                    self.stats.retries += 1;
                    record_flush_retry(self.mode, attempt);
                    thread::sleep(self.retry.backoff());
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        sink = self.sink.name(),
                        mode = %self.mode,
                        attempts = attempt,
                        pending = self.pending.len(),
                        persisted = self.stats.persisted,
                        error = %e,
                        "flush failed, giving up"
                    );
                    record_flush_failed(self.mode);
                    return Err(ConsumerError::RetriesExhausted {
                        store: self.sink.name().to_string(),
                        attempts: attempt,
                        persisted: self.stats.persisted,
                        pending: self.pending.len(),
                        source: e,
                    });
                }
            }
        }
    }

    /// Final flush, then close the sink
    ///
    /// Every batch is committed once the final flush succeeds, so a failing
    /// `close` (e.g. a WAL checkpoint) is logged and does not fail the consumer.
    pub fn finish(&mut self) -> Result<(), ConsumerError> {
        self.flush()?;
        if let Err(e) = self.sink.close() {
            warn!(
                store = self.sink.name(),
                persisted = self.stats.persisted,
                error = %e,
                "sink close failed after final flush"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use contracts::{ContractError, Event, EventSink};

    /// In-memory sink that fails the first `fail_first` attempts of each batch
    #[derive(Clone, Default)]
    pub struct MemorySink {
        pub batches: Arc<Mutex<Vec<Vec<u64>>>>,
        pub fail_first: u32,
        pub permanent: bool,
        pub close_fails: bool,
        failures_this_batch: Arc<AtomicU32>,
    }

    impl MemorySink {
        pub fn flaky(fail_first: u32) -> Self {
            Self {
                fail_first,
                ..Default::default()
            }
        }

        pub fn broken() -> Self {
            Self {
                permanent: true,
                ..Default::default()
            }
        }

        pub fn failing_close() -> Self {
            Self {
                close_fails: true,
                ..Default::default()
            }
        }

        pub fn ids(&self) -> Vec<u64> {
            self.batches.lock().unwrap().iter().flatten().copied().collect()
        }

        pub fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().iter().map(Vec::len).collect()
        }
    }

    impl EventSink for MemorySink {
        fn name(&self) -> &str {
            "memory"
        }

        fn persist(&mut self, batch: &[Event]) -> Result<(), ContractError> {
            if self.permanent
                || self.failures_this_batch.load(Ordering::SeqCst) < self.fail_first
            {
                self.failures_this_batch.fetch_add(1, Ordering::SeqCst);
                return Err(ContractError::persistence("memory", "disk unavailable"));
            }
            self.failures_this_batch.store(0, Ordering::SeqCst);
            self.batches
                .lock()
                .unwrap()
                .push(batch.iter().map(|e| e.id).collect());
            Ok(())
        }

        fn close(&mut self) -> Result<(), ContractError> {
            if self.close_fails {
                return Err(ContractError::persistence("memory", "checkpoint failed"));
            }
            Ok(())
        }
    }
}
