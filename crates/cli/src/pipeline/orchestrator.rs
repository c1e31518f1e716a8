//! Benchmark harness - runs each configured mode end to end.
//!
//! One pass per mode: open the store, attach consumers, generate and submit
//! every event, close the dispatch core, wait for the consumers, then read
//! counters from every stage into a `ModeReport`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use consumer::{ConsumerSettings, ConsumerTotals};
use contracts::{CancellationToken, ContractError, DispatchMode, SimulationBlueprint};
use dispatcher::{DispatchCore, DispatchError};
use generator::{EventGenerator, GeneratorConfig};
use observability::{record_phase, ComparisonReport, ModeOutcome, ModeReport, PhaseTimer, RunPhase};
use persister::{PersisterMetrics, SqliteStore, StoreOptions};
use tracing::{error, info, instrument, warn};

use super::strategy::{open_stores, ConsumerStrategy, PullStrategy, PushStrategy};

/// Result of the producer side of a pass
struct Production {
    produced: u64,
    elapsed: Duration,
    result: Result<()>,
}

/// Runs the configured modes one after another
pub struct Harness {
    blueprint: SimulationBlueprint,
    cancel: CancellationToken,
}

impl Harness {
    pub fn new(blueprint: SimulationBlueprint, cancel: CancellationToken) -> Self {
        Self { blueprint, cancel }
    }

    /// Run every mode in configuration order
    ///
    /// A failed mode does not stop the next one; cancellation does.
    pub fn run(&self) -> ComparisonReport {
        let mut comparison =
            ComparisonReport::new(self.blueprint.simulation.events, self.blueprint.batch_size());
        for &mode in &self.blueprint.modes {
            if self.cancel.is_cancelled() {
                warn!(mode = %mode, "run cancelled, mode skipped");
                break;
            }
            comparison.push(self.run_mode(mode));
        }
        comparison
    }

    fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_millis(self.blueprint.storage.busy_timeout_ms),
        }
    }

    fn strategy(
        &self,
        mode: DispatchMode,
        path: &Path,
        metrics: &Arc<PersisterMetrics>,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn ConsumerStrategy>, ContractError> {
        let settings = ConsumerSettings::from_blueprint(&self.blueprint);
        let strategy: Box<dyn ConsumerStrategy> = match mode {
            DispatchMode::Pull => {
                let stores = open_stores(
                    path,
                    self.store_options(),
                    self.blueprint.consumer.pull_consumers,
                    metrics,
                )?;
                Box::new(PullStrategy::new(stores, settings, cancel.clone()))
            }
            DispatchMode::Push => {
                let mut stores = open_stores(path, self.store_options(), 1, metrics)?;
                let store = stores
                    .pop()
                    .ok_or_else(|| ContractError::persistence(mode.as_str(), "no store opened"))?;
                Box::new(PushStrategy::new(store, &settings))
            }
        };
        Ok(strategy)
    }

    /// One full pass of `mode`
    #[instrument(name = "harness_mode", skip(self), fields(mode = %mode))]
    pub fn run_mode(&self, mode: DispatchMode) -> ModeReport {
        let mut report = ModeReport::new(mode);
        let mut total = PhaseTimer::started();
        let mode_cancel = self.cancel.child_token();
        let metrics = Arc::new(PersisterMetrics::new());
        let path = self.blueprint.storage.db_path(mode);

        let core = Arc::new(DispatchCore::with_cancellation(
            mode,
            &self.blueprint.dispatch,
            mode_cancel.clone(),
        ));
        let mut strategy = match self.strategy(mode, &path, &metrics, &mode_cancel) {
            Ok(strategy) => strategy,
            Err(e) => {
                error!(error = %e, "mode setup failed");
                report.outcome = failed(RunPhase::Setup, &e);
                report.total = total.stop();
                return report;
            }
        };
        if let Err(e) = strategy.attach(&core) {
            error!(error = %e, "consumer attach failed");
            mode_cancel.cancel();
            // Consumers already started still need the end-of-stream marker.
            let _ = core.close();
            let _ = strategy.complete();
            report.outcome = failed(RunPhase::Setup, &e);
            report.total = total.stop();
            return report;
        }
        info!(
            path = %path.display(),
            events = self.blueprint.simulation.events,
            batch_size = self.blueprint.batch_size(),
            "mode started"
        );

        let production = self.produce(&core, &mode_cancel);
        let outcome = strategy.complete();

        let totals: ConsumerTotals = outcome.reports.iter().collect();
        let dispatch = core.metrics();
        let persisted = metrics.snapshot();

        report.produced = production.produced;
        report.generation = production.elapsed;
        report.submitted = dispatch.submitted;
        report.dropped = dispatch.dropped;
        report.backpressure_waits = dispatch.backpressure_waits;
        report.queue_high_water = dispatch.queue_high_water;
        report.processed = totals.persisted
            + outcome
                .failure
                .as_ref()
                .and_then(|e| e.persisted())
                .unwrap_or(0);
        report.processing = totals.elapsed;
        report.bulk_writes = persisted.bulk_writes;
        report.retries = totals.retries;
        report.flush_latency_ms = totals.flush_latency_ms.summary();
        report.stored = match count_stored(&path, self.store_options()) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "could not count stored rows");
                0
            }
        };
        report.outcome = if let Some(e) = &outcome.failure {
            failed(RunPhase::Processing, e)
        } else if self.cancel.is_cancelled() {
            ModeOutcome::Cancelled
        } else if let Err(e) = &production.result {
            ModeOutcome::Failed {
                phase: RunPhase::Generation,
                message: format!("{e:#}"),
            }
        } else {
            ModeOutcome::Completed
        };
        report.total = total.stop();

        record_phase(
            mode,
            "generation",
            report.generation.as_secs_f64(),
            report.generation_throughput(),
        );
        record_phase(
            mode,
            "processing",
            report.processing.as_secs_f64(),
            report.processing_throughput(),
        );
        info!(
            outcome = %report.outcome,
            produced = report.produced,
            stored = report.stored,
            dropped = report.dropped,
            bulk_writes = report.bulk_writes,
            duplicates_ignored = persisted.duplicates_ignored,
            total_secs = report.total.as_secs_f64(),
            "mode finished"
        );
        report
    }

    /// Generate and submit every event, then close the core
    ///
    /// Always closes the core so pull consumers see the end of stream.
    fn produce(&self, core: &DispatchCore, cancel: &CancellationToken) -> Production {
        let mut timer = PhaseTimer::started();
        let mut produced = 0;
        let result = self.submit_all(core, cancel, &mut produced);
        let elapsed = timer.stop();

        let result = match (result, core.close()) {
            (Err(e), _) => Err(e),
            (Ok(()), closed) => closed.context("closing dispatch core"),
        };
        if let Err(e) = &result {
            warn!(error = %format!("{e:#}"), produced, "generation stopped early");
        }
        Production {
            produced,
            elapsed,
            result,
        }
    }

    fn submit_all(
        &self,
        core: &DispatchCore,
        cancel: &CancellationToken,
        produced: &mut u64,
    ) -> Result<()> {
        let mut generator = EventGenerator::new(GeneratorConfig::from(&self.blueprint.simulation))
            .context("creating event generator")?;
        let mut stream = generator
            .generate(self.blueprint.simulation.events)
            .context("opening event stream")?;
        let chunk = self.blueprint.batch_size();

        loop {
            if cancel.is_cancelled() {
                info!(produced = *produced, "generation cancelled");
                return Ok(());
            }
            let batch = stream.next_batch(chunk);
            if batch.is_empty() {
                return Ok(());
            }
            *produced += batch.len() as u64;
            match core.submit_batch(batch) {
                Ok(_) => {}
                Err(DispatchError::Cancelled { event_id }) => {
                    info!(produced = *produced, event_id, "generation cancelled mid-chunk");
                    return Ok(());
                }
                Err(e) => return Err(e).context("submitting events"),
            }
        }
    }
}

fn failed(phase: RunPhase, error: &dyn std::error::Error) -> ModeOutcome {
    ModeOutcome::Failed {
        phase,
        message: error.to_string(),
    }
}

fn count_stored(path: &Path, options: StoreOptions) -> Result<u64, ContractError> {
    SqliteStore::open(path, options)?.count()
}
