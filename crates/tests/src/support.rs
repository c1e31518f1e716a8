//! Shared fixtures for the end-to-end tests

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use consumer::{ConsumerError, ConsumerReport, ConsumerSettings, PullConsumer};
use contracts::{CancellationToken, ContractError, Event, EventSink, RetryPolicy};
use dispatcher::DispatchCore;
use generator::{EventGenerator, GeneratorConfig};
use persister::{SqliteStore, StoreOptions};
use tempfile::TempDir;

pub const SEED: u64 = 2024;

pub fn generate(n: u64) -> Vec<Event> {
    EventGenerator::new(GeneratorConfig::seeded(SEED))
        .unwrap()
        .generate(n)
        .unwrap()
        .collect()
}

pub fn settings(batch_size: usize) -> ConsumerSettings {
    ConsumerSettings {
        batch_size,
        poll_interval: Duration::from_millis(1),
        retry: RetryPolicy {
            max_attempts: 3,
            backoff_ms: 0,
        },
    }
}

pub fn db_path(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

pub fn create_store(path: &Path) -> SqliteStore {
    SqliteStore::create(path, StoreOptions::default()).unwrap()
}

/// Ids in the order the rows were inserted
pub fn stored_ids(path: &Path) -> Vec<u64> {
    SqliteStore::open(path, StoreOptions::default())
        .unwrap()
        .event_ids_in_insertion_order()
        .unwrap()
}

pub fn spawn_pull<S: EventSink + 'static>(
    name: &str,
    core: &Arc<DispatchCore>,
    sink: S,
    settings: ConsumerSettings,
    cancel: CancellationToken,
) -> JoinHandle<Result<ConsumerReport, ConsumerError>> {
    let consumer = PullConsumer::new(name, core.clone(), sink, settings, cancel);
    thread::spawn(move || consumer.run())
}

/// SqliteStore wrapper that injects failures and delays and records batch sizes
pub struct ProbeSink {
    inner: SqliteStore,
    fail_per_batch: u32,
    failed_this_batch: u32,
    delay: Duration,
    close_fails: bool,
    batch_sizes: Arc<Mutex<Vec<usize>>>,
}

impl ProbeSink {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            fail_per_batch: 0,
            failed_this_batch: 0,
            delay: Duration::ZERO,
            close_fails: false,
            batch_sizes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail the first `k` attempts of every batch
    pub fn failing(mut self, k: u32) -> Self {
        self.fail_per_batch = k;
        self
    }

    /// Sleep before every successful write
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make `close` fail after the underlying store closed
    pub fn failing_close(mut self) -> Self {
        self.close_fails = true;
        self
    }

    /// Handle to the sizes of successful writes, readable after the sink moved
    pub fn batch_sizes(&self) -> Arc<Mutex<Vec<usize>>> {
        self.batch_sizes.clone()
    }
}

impl EventSink for ProbeSink {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn persist(&mut self, batch: &[Event]) -> Result<(), ContractError> {
        if batch.is_empty() {
            return Ok(());
        }
        if self.failed_this_batch < self.fail_per_batch {
            self.failed_this_batch += 1;
            return Err(ContractError::persistence(
                self.inner.name(),
                "injected failure",
            ));
        }
        self.failed_this_batch = 0;
        thread::sleep(self.delay);
        self.inner.persist(batch)?;
        self.batch_sizes.lock().unwrap().push(batch.len());
        Ok(())
    }

    fn close(&mut self) -> Result<(), ContractError> {
        self.inner.close()?;
        if self.close_fails {
            return Err(ContractError::persistence(self.inner.name(), "checkpoint failed"));
        }
        Ok(())
    }
}
