//! Consumer strategies - how a mode pass wires consumers to the dispatch core

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use consumer::{ConsumerError, ConsumerReport, ConsumerSettings, PullConsumer, PushConsumer};
use contracts::{CancellationToken, ContractError, EventHandler};
use dispatcher::DispatchCore;
use persister::{PersisterMetrics, SqliteStore, StoreOptions};
use tracing::{debug, error, warn};

/// What the consumers of one mode pass produced
#[derive(Debug, Default)]
pub struct StrategyOutcome {
    pub reports: Vec<ConsumerReport>,
    /// First consumer failure, if any
    pub failure: Option<ConsumerError>,
}

impl StrategyOutcome {
    fn record(&mut self, result: Result<ConsumerReport, ConsumerError>) {
        match result {
            Ok(report) => self.reports.push(report),
            Err(e) if self.failure.is_none() => self.failure = Some(e),
            Err(e) => warn!(error = %e, "additional consumer failure"),
        }
    }
}

/// Consumer side of one mode
///
/// `attach` runs before the first event is generated; `complete` runs after
/// the dispatch core is closed and waits for every consumer to finish.
pub trait ConsumerStrategy {
    fn attach(&mut self, core: &Arc<DispatchCore>) -> Result<(), ContractError>;

    fn complete(self: Box<Self>) -> StrategyOutcome;
}

/// Open the per-mode store (recreated) plus one extra connection per
/// additional consumer, all sharing one set of counters
pub fn open_stores(
    path: &Path,
    options: StoreOptions,
    count: usize,
    metrics: &Arc<PersisterMetrics>,
) -> Result<Vec<SqliteStore>, ContractError> {
    let mut stores = Vec::with_capacity(count.max(1));
    stores.push(SqliteStore::create(path, options)?.with_metrics(metrics.clone()));
    for _ in 1..count {
        stores.push(SqliteStore::open(path, options)?.with_metrics(metrics.clone()));
    }
    Ok(stores)
}

/// One or more polling consumers, each on its own thread with its own store
pub struct PullStrategy {
    stores: Vec<SqliteStore>,
    settings: ConsumerSettings,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<Result<ConsumerReport, ConsumerError>>>,
}

impl PullStrategy {
    pub fn new(stores: Vec<SqliteStore>, settings: ConsumerSettings, cancel: CancellationToken) -> Self {
        Self {
            stores,
            settings,
            cancel,
            workers: Vec::new(),
        }
    }
}

impl ConsumerStrategy for PullStrategy {
    fn attach(&mut self, core: &Arc<DispatchCore>) -> Result<(), ContractError> {
        for (i, store) in self.stores.drain(..).enumerate() {
            let name = format!("pull-{i}");
            let consumer = PullConsumer::new(
                name.clone(),
                core.clone(),
                store,
                self.settings,
                self.cancel.clone(),
            );
            let cancel = self.cancel.clone();
            let worker = thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    let result = consumer.run();
                    if result.is_err() {
                        // Unblocks a producer waiting on a full queue.
                        cancel.cancel();
                    }
                    result
                })?;
            debug!(consumer = %name, "pull consumer spawned");
            self.workers.push(worker);
        }
        Ok(())
    }

    fn complete(self: Box<Self>) -> StrategyOutcome {
        let mut outcome = StrategyOutcome::default();
        for worker in self.workers {
            let name = worker.thread().name().unwrap_or("pull").to_string();
            let result = worker.join().unwrap_or_else(|_| {
                error!(consumer = %name, "pull consumer thread panicked");
                Err(ConsumerError::Contract(ContractError::Other(format!(
                    "consumer thread '{name}' panicked"
                ))))
            });
            outcome.record(result);
        }
        outcome
    }
}

/// A single registered callback consumer driven by the producer's thread
pub struct PushStrategy {
    consumer: Arc<PushConsumer<SqliteStore>>,
}

impl PushStrategy {
    pub fn new(store: SqliteStore, settings: &ConsumerSettings) -> Self {
        Self {
            consumer: Arc::new(PushConsumer::new("push-0", store, settings)),
        }
    }
}

impl ConsumerStrategy for PushStrategy {
    fn attach(&mut self, core: &Arc<DispatchCore>) -> Result<(), ContractError> {
        let handler: Arc<dyn EventHandler> = self.consumer.clone();
        core.register(self.consumer.handle().clone(), handler);
        Ok(())
    }

    fn complete(self: Box<Self>) -> StrategyOutcome {
        let mut outcome = StrategyOutcome::default();
        outcome.record(self.consumer.finish());
        outcome
    }
}
