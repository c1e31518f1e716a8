//! PullConsumer - polls the dispatch core's queue and flushes in bulk

use std::fmt;
use std::sync::Arc;
use std::thread;

use contracts::{CancellationToken, DispatchMode, Event, EventConsumer, EventSink};
use dispatcher::DispatchCore;
use observability::{record_queue_depth, PhaseTimer};
use tracing::{debug, info, instrument, trace};

use crate::batch::BatchWriter;
use crate::error::ConsumerError;
use crate::{ConsumerReport, ConsumerSettings};

/// Pull consumer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullState {
    Idle,
    Polling,
    Batching,
    Flushing,
    /// End of stream observed and everything flushed
    Drained,
    /// Stopped by cancellation after flushing the partial batch
    Cancelled,
}

impl PullState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PullState::Drained | PullState::Cancelled)
    }
}

impl fmt::Display for PullState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PullState::Idle => "idle",
            PullState::Polling => "polling",
            PullState::Batching => "batching",
            PullState::Flushing => "flushing",
            PullState::Drained => "drained",
            PullState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Consumer-initiated polling of a shared queue
pub struct PullConsumer<S: EventSink> {
    name: String,
    core: Arc<DispatchCore>,
    writer: BatchWriter<S>,
    settings: ConsumerSettings,
    cancel: CancellationToken,
    state: PullState,
    polls: u64,
    empty_polls: u64,
}

impl<S: EventSink> PullConsumer<S> {
    pub fn new(
        name: impl Into<String>,
        core: Arc<DispatchCore>,
        sink: S,
        settings: ConsumerSettings,
        cancel: CancellationToken,
    ) -> Self {
        let writer = BatchWriter::new(sink, DispatchMode::Pull, settings.batch_size, settings.retry);
        Self {
            name: name.into(),
            core,
            writer,
            settings,
            cancel,
            state: PullState::Idle,
            polls: 0,
            empty_polls: 0,
        }
    }

    pub fn state(&self) -> PullState {
        self.state
    }

    fn transition(&mut self, next: PullState) {
        if self.state != next {
            trace!(consumer = %self.name, from = %self.state, to = %next, "pull state");
            self.state = next;
        }
    }

    /// Poll until end of stream (or cancellation), then close the sink
    ///
    /// # Errors
    /// `ConsumerError::RetriesExhausted` when a batch cannot be persisted.
    #[instrument(name = "pull_consumer_run", skip(self), fields(consumer = %self.name))]
    pub fn run(mut self) -> Result<ConsumerReport, ConsumerError> {
        let mut timer = PhaseTimer::started();
        info!(
            batch_size = self.writer.batch_size(),
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            "pull consumer started"
        );
        self.transition(PullState::Polling);

        loop {
            if self.cancel.is_cancelled() {
                self.transition(PullState::Flushing);
                self.writer.flush()?;
                self.transition(PullState::Cancelled);
                break;
            }

            let drained = self.core.drain(self.writer.remaining_capacity());
            self.polls += 1;
            let got = drained.len();
            if got > 0 {
                self.transition(PullState::Batching);
                // Never exceeds the threshold: drain asked for the remaining room only.
                self.writer.extend(drained.events)?;
            }

            if drained.end_of_stream {
                self.transition(PullState::Flushing);
                self.writer.flush()?;
                self.transition(PullState::Drained);
                break;
            }

            self.transition(PullState::Polling);
            if got == 0 {
                self.empty_polls += 1;
                record_queue_depth(self.core.queue_len());
                thread::sleep(self.settings.poll_interval);
            }
        }

        self.writer.finish()?;
        let elapsed = timer.stop();
        let report = ConsumerReport::new(
            self.name.clone(),
            DispatchMode::Pull,
            self.writer.stats().clone(),
            elapsed,
        )
        .with_polls(self.polls, self.empty_polls)
        .with_final_state(self.state);

        info!(
            state = %self.state,
            persisted = report.stats.persisted,
            bulk_writes = report.stats.bulk_writes,
            polls = self.polls,
            empty_polls = self.empty_polls,
            "pull consumer finished"
        );
        debug!(retries = report.stats.retries, "pull consumer retry total");
        Ok(report)
    }
}

impl<S: EventSink> EventConsumer for PullConsumer<S> {
    type Error = ConsumerError;

    fn accept(&mut self, event: Event) -> Result<(), ConsumerError> {
        self.writer.accept(event)
    }

    fn flush(&mut self) -> Result<(), ConsumerError> {
        self.writer.flush()
    }
}
