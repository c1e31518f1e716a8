//! PushConsumer - receives events on the producer's thread

use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{ConsumerHandle, ContractError, DispatchMode, Event, EventConsumer, EventHandler, EventSink};
use observability::PhaseTimer;
use tracing::{debug, info, warn};

use crate::batch::BatchWriter;
use crate::error::ConsumerError;
use crate::{ConsumerReport, ConsumerSettings};

struct PushState<S: EventSink> {
    writer: BatchWriter<S>,
    timer: PhaseTimer,
    invocations: u64,
    failure: Option<ConsumerError>,
    finished: bool,
}

/// Producer-initiated delivery target
///
/// Every callback appends to a micro-batch and flushes as soon as it reaches
/// `batch_size`. The flush runs inside the producer's `submit`, so producer
/// throughput carries the persistence cost. `finish()` must be called after
/// the stream ends to write the last partial batch.
pub struct PushConsumer<S: EventSink> {
    handle: ConsumerHandle,
    state: Mutex<PushState<S>>,
}

impl<S: EventSink> PushConsumer<S> {
    pub fn new(handle: impl Into<ConsumerHandle>, sink: S, settings: &ConsumerSettings) -> Self {
        let writer = BatchWriter::new(sink, DispatchMode::Push, settings.batch_size, settings.retry);
        Self {
            handle: handle.into(),
            state: Mutex::new(PushState {
                writer,
                timer: PhaseTimer::new(),
                invocations: 0,
                failure: None,
                finished: false,
            }),
        }
    }

    pub fn handle(&self) -> &ConsumerHandle {
        &self.handle
    }

    fn lock(&self) -> MutexGuard<'_, PushState<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Events waiting below the flush threshold
    pub fn pending(&self) -> usize {
        self.lock().writer.pending_len()
    }

    fn receive(&self, events: &[Event]) -> Result<(), ContractError> {
        let mut state = self.lock();
        if let Some(failure) = &state.failure {
            return Err(failure.to_contract());
        }
        if state.finished {
            warn!(handle = %self.handle, "event received after finish, ignored");
            return Ok(());
        }
        if !state.timer.is_running() {
            state.timer.start();
        }
        state.invocations += 1;

        if let Err(e) = state.writer.extend(events.iter().cloned()) {
            let contract = e.to_contract();
            state.failure = Some(e);
            return Err(contract);
        }
        Ok(())
    }

    /// Mandatory final flush, then close the sink
    ///
    /// A zero-row final flush writes nothing. Calling it twice is harmless.
    pub fn finish(&self) -> Result<ConsumerReport, ConsumerError> {
        let mut state = self.lock();
        if let Some(failure) = state.failure.take() {
            state.finished = true;
            return Err(failure);
        }
        if !state.finished {
            let pending = state.writer.pending_len();
            state.writer.finish()?;
            state.finished = true;
            debug!(handle = %self.handle, final_rows = pending, "final flush done");
        }
        let elapsed = state.timer.stop();
        let report = ConsumerReport::new(
            self.handle.to_string(),
            DispatchMode::Push,
            state.writer.stats().clone(),
            elapsed,
        )
        .with_invocations(state.invocations);

        info!(
            handle = %self.handle,
            persisted = report.stats.persisted,
            bulk_writes = report.stats.bulk_writes,
            invocations = state.invocations,
            "push consumer finished"
        );
        Ok(report)
    }
}

impl<S: EventSink> EventHandler for PushConsumer<S> {
    fn on_event(&self, event: &Event) -> Result<(), ContractError> {
        self.receive(std::slice::from_ref(event))
    }

    fn on_batch(&self, events: &[Event]) -> Result<(), ContractError> {
        self.receive(events)
    }
}

impl<S: EventSink> EventConsumer for PushConsumer<S> {
    type Error = ConsumerError;

    fn accept(&mut self, event: Event) -> Result<(), ConsumerError> {
        self.lock().writer.accept(event)
    }

    fn flush(&mut self) -> Result<(), ConsumerError> {
        self.lock().writer.flush()
    }
}
