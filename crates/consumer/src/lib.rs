//! # Consumer
//!
//! Pull and push consumer strategies over the dispatch core.
//!
//! Both share the `BatchWriter` flush contract: accumulate up to
//! `batch_size` events, persist them in one bulk write, retry failed writes
//! per the retry policy.
//!
//! ## Usage Example
//!
//! ```ignore
//! use consumer::{ConsumerSettings, PullConsumer, PushConsumer};
//!
//! // pull: run on its own thread until end of stream
//! let consumer = PullConsumer::new("pull-0", core.clone(), store, settings, cancel);
//! let report = std::thread::spawn(move || consumer.run()).join()??;
//!
//! // push: register before generation, finish after
//! let consumer = Arc::new(PushConsumer::new("push", store, &settings));
//! core.register("push", consumer.clone());
//! // ... submit events ...
//! let report = consumer.finish()?;
//! ```

mod batch;
mod error;
mod pull;
mod push;

use std::time::Duration;

use contracts::{DispatchMode, RetryPolicy, SimulationBlueprint};
use observability::RunningStats;

pub use batch::{BatchWriter, FlushStats};
pub use error::ConsumerError;
pub use pull::{PullConsumer, PullState};
pub use push::PushConsumer;

/// Consumer knobs resolved from the blueprint
#[derive(Debug, Clone, Copy)]
pub struct ConsumerSettings {
    /// Flush threshold
    pub batch_size: usize,
    /// Sleep between empty polls (pull only)
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl ConsumerSettings {
    pub fn from_blueprint(blueprint: &SimulationBlueprint) -> Self {
        Self {
            batch_size: blueprint.batch_size(),
            poll_interval: blueprint.consumer.poll_interval(),
            retry: blueprint.consumer.retry,
        }
    }
}

/// What one consumer did during a mode pass
#[derive(Debug, Clone)]
pub struct ConsumerReport {
    pub name: String,
    pub mode: DispatchMode,
    pub stats: FlushStats,
    /// Processing phase, first work to final flush
    pub elapsed: Duration,
    /// Pull only
    pub final_state: Option<PullState>,
    pub polls: u64,
    pub empty_polls: u64,
    /// Push only: handler calls received
    pub invocations: u64,
}

impl ConsumerReport {
    pub(crate) fn new(name: String, mode: DispatchMode, stats: FlushStats, elapsed: Duration) -> Self {
        Self {
            name,
            mode,
            stats,
            elapsed,
            final_state: None,
            polls: 0,
            empty_polls: 0,
            invocations: 0,
        }
    }

    pub(crate) fn with_polls(mut self, polls: u64, empty_polls: u64) -> Self {
        self.polls = polls;
        self.empty_polls = empty_polls;
        self
    }

    pub(crate) fn with_final_state(mut self, state: PullState) -> Self {
        self.final_state = Some(state);
        self
    }

    pub(crate) fn with_invocations(mut self, invocations: u64) -> Self {
        self.invocations = invocations;
        self
    }
}

/// Totals across several consumers of one mode
#[derive(Debug, Clone, Default)]
pub struct ConsumerTotals {
    pub persisted: u64,
    pub bulk_writes: u64,
    pub retries: u64,
    /// Longest processing phase among the consumers
    pub elapsed: Duration,
    pub flush_latency_ms: RunningStats,
}

impl ConsumerTotals {
    pub fn add(&mut self, report: &ConsumerReport) {
        self.persisted += report.stats.persisted;
        self.bulk_writes += report.stats.bulk_writes;
        self.retries += report.stats.retries;
        self.elapsed = self.elapsed.max(report.elapsed);
        self.flush_latency_ms.merge(&report.stats.flush_latency_ms);
    }
}

impl<'a> FromIterator<&'a ConsumerReport> for ConsumerTotals {
    fn from_iter<I: IntoIterator<Item = &'a ConsumerReport>>(iter: I) -> Self {
        let mut totals = Self::default();
        for report in iter {
            totals.add(report);
        }
        totals
    }
}
