//! DispatchCore - pull queue and push registry behind one `submit`

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use contracts::{
    CancellationToken, ConsumerHandle, DispatchConfig, DispatchMode, Event, EventHandler,
};
use metrics::counter;
use tracing::{debug, info, instrument};

use crate::error::DispatchError;
use crate::metrics::{DispatchMetrics, DispatchSnapshot};
use crate::queue::{Drained, EventQueue, SubmitOutcome};
use crate::registry::HandlerRegistry;

/// Totals of one `submit_batch` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSubmission {
    pub accepted: usize,
    pub dropped: usize,
}

/// Dispatch core for one mode pass
///
/// Shared as `Arc<DispatchCore>` between the producer and consumer threads.
/// Pull and push never share an instance.
pub struct DispatchCore {
    mode: DispatchMode,
    queue: EventQueue,
    registry: HandlerRegistry,
    push_buffer: Mutex<Vec<Event>>,
    push_batch_size: usize,
    closed: AtomicBool,
    cancel: CancellationToken,
    metrics: Arc<DispatchMetrics>,
}

impl DispatchCore {
    /// Create a core for `mode`
    pub fn new(mode: DispatchMode, config: &DispatchConfig) -> Self {
        Self::with_cancellation(mode, config, CancellationToken::new())
    }

    /// Create a core whose submissions stop once `cancel` fires
    ///
    /// Push submissions are refused outright, pull submissions only when they
    /// would wait for queue space.
    pub fn with_cancellation(
        mode: DispatchMode,
        config: &DispatchConfig,
        cancel: CancellationToken,
    ) -> Self {
        let metrics = Arc::new(DispatchMetrics::new());
        let push_batch_size = config.push_batch_size.max(1);
        debug!(
            mode = %mode,
            capacity = ?config.capacity(),
            backpressure = ?config.backpressure,
            push_batch_size,
            "dispatch core created"
        );
        Self {
            mode,
            queue: EventQueue::new(config.capacity(), config.backpressure, metrics.clone()),
            registry: HandlerRegistry::new(),
            push_buffer: Mutex::new(Vec::with_capacity(push_batch_size)),
            push_batch_size,
            closed: AtomicBool::new(false),
            cancel,
            metrics,
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Submit one event according to the mode
    ///
    /// Pull enqueues (applying backpressure). Push invokes every registered
    /// handler in registration order before returning, or buffers the event
    /// when a push micro-batch is configured.
    pub fn submit(&self, event: Event) -> Result<SubmitOutcome, DispatchError> {
        let outcome = match self.mode {
            DispatchMode::Pull => self.queue.push(event, &self.cancel)?,
            DispatchMode::Push => self.push(event)?,
        };
        match outcome {
            SubmitOutcome::Accepted => {
                self.metrics.inc_submitted();
                counter!("dispatch_bench_events_submitted_total", "mode" => self.mode.as_str())
                    .increment(1);
            }
            SubmitOutcome::Dropped => {
                counter!("dispatch_bench_events_dropped_total", "mode" => self.mode.as_str())
                    .increment(1);
            }
        }
        Ok(outcome)
    }

    /// Submit a chunk in order, stopping at the first error
    pub fn submit_batch(
        &self,
        events: impl IntoIterator<Item = Event>,
    ) -> Result<BatchSubmission, DispatchError> {
        let mut summary = BatchSubmission::default();
        for event in events {
            match self.submit(event)? {
                SubmitOutcome::Accepted => summary.accepted += 1,
                SubmitOutcome::Dropped => summary.dropped += 1,
            }
        }
        Ok(summary)
    }

    fn push(&self, event: Event) -> Result<SubmitOutcome, DispatchError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DispatchError::Closed { event_id: event.id });
        }
        if self.cancel.is_cancelled() {
            return Err(DispatchError::Cancelled { event_id: event.id });
        }

        if self.push_batch_size == 1 {
            for registration in self.registry.snapshot().iter() {
                registration
                    .handler
                    .on_event(&event)
                    .map_err(|e| DispatchError::handler(&registration.handle, event.id, e))?;
                self.metrics.inc_handler_calls();
            }
            return Ok(SubmitOutcome::Accepted);
        }

        let full = {
            let mut buffer = self.lock_buffer();
            buffer.push(event);
            (buffer.len() >= self.push_batch_size).then(|| mem::take(&mut *buffer))
        };
        if let Some(batch) = full {
            self.deliver_batch(&batch)?;
        }
        Ok(SubmitOutcome::Accepted)
    }

    fn deliver_batch(&self, batch: &[Event]) -> Result<(), DispatchError> {
        let Some(first) = batch.first() else {
            return Ok(());
        };
        for registration in self.registry.snapshot().iter() {
            registration
                .handler
                .on_batch(batch)
                .map_err(|e| DispatchError::handler(&registration.handle, first.id, e))?;
            self.metrics.inc_handler_calls();
        }
        Ok(())
    }

    fn lock_buffer(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        self.push_buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove up to `max_batch` queued events, FIFO, without blocking
    pub fn drain(&self, max_batch: usize) -> Drained {
        self.queue.drain(max_batch)
    }

    /// Remove up to `max_batch` events, waiting up to `timeout` for data
    pub fn drain_timeout(&self, max_batch: usize, timeout: Duration) -> Drained {
        self.queue.drain_timeout(max_batch, timeout)
    }

    /// Add a push handler (see `EventHandler` for the bounded-execution rule)
    pub fn register(&self, handle: impl Into<ConsumerHandle>, handler: Arc<dyn EventHandler>) {
        self.registry.register(handle.into(), handler);
    }

    /// Remove a push handler
    pub fn unregister(&self, handle: &ConsumerHandle) -> bool {
        self.registry.unregister(handle)
    }

    /// Mark end of stream
    ///
    /// Flushes any push micro-batch, then enqueues the end-of-stream marker.
    /// Further submissions fail with `DispatchError::Closed`.
    #[instrument(name = "dispatch_core_close", skip(self), fields(mode = %self.mode))]
    pub fn close(&self) -> Result<(), DispatchError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let pending = mem::take(&mut *self.lock_buffer());
        let flushed = self.deliver_batch(&pending);
        self.queue.close();
        info!(
            submitted = self.total_submitted(),
            queued = self.queue.len(),
            pending_push = pending.len(),
            "dispatch core closed"
        );
        flushed
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Events accepted so far
    pub fn total_submitted(&self) -> u64 {
        self.metrics.submitted()
    }

    /// Events waiting in the pull queue
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn handler_count(&self) -> usize {
        self.registry.len()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn metrics(&self) -> DispatchSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BackpressurePolicy, ContractError};
    use generator::{EventGenerator, GeneratorConfig};
    use std::sync::atomic::AtomicU64;
    use std::thread;

    fn events(n: usize) -> Vec<Event> {
        EventGenerator::new(GeneratorConfig::seeded(9))
            .unwrap()
            .generate_batch(n)
            .unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        ids: Mutex<Vec<u64>>,
        batches: AtomicU64,
    }

    impl EventHandler for Recorder {
        fn on_event(&self, event: &Event) -> Result<(), ContractError> {
            self.ids.lock().unwrap().push(event.id);
            Ok(())
        }

        fn on_batch(&self, events: &[Event]) -> Result<(), ContractError> {
            self.batches.fetch_add(1, Ordering::Relaxed);
            self.ids.lock().unwrap().extend(events.iter().map(|e| e.id));
            Ok(())
        }
    }

    struct Tagger {
        tag: &'static str,
        log: Arc<Mutex<Vec<(&'static str, u64)>>>,
    }

    impl EventHandler for Tagger {
        fn on_event(&self, event: &Event) -> Result<(), ContractError> {
            self.log.lock().unwrap().push((self.tag, event.id));
            Ok(())
        }
    }

    struct Failing;

    impl EventHandler for Failing {
        fn on_event(&self, _event: &Event) -> Result<(), ContractError> {
            Err(ContractError::persistence("test", "down"))
        }
    }

    #[test]
    fn test_push_without_handlers_is_noop() {
        let core = DispatchCore::new(DispatchMode::Push, &DispatchConfig::default());
        let outcome = core.submit(events(1).remove(0)).unwrap();
        assert_eq!(outcome, SubmitOutcome::Accepted);
        assert_eq!(core.total_submitted(), 1);
    }

    #[test]
    fn test_push_registration_order() {
        let core = DispatchCore::new(DispatchMode::Push, &DispatchConfig::default());
        let log = Arc::new(Mutex::new(Vec::new()));
        core.register(
            "first",
            Arc::new(Tagger {
                tag: "first",
                log: log.clone(),
            }),
        );
        core.register(
            "second",
            Arc::new(Tagger {
                tag: "second",
                log: log.clone(),
            }),
        );

        core.submit_batch(events(2)).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![("first", 1), ("second", 1), ("first", 2), ("second", 2)]
        );
    }

    #[test]
    fn test_push_synchronous_delivery() {
        let core = DispatchCore::new(DispatchMode::Push, &DispatchConfig::default());
        let recorder = Arc::new(Recorder::default());
        core.register("rec", recorder.clone());
        for event in events(3) {
            let id = event.id;
            core.submit(event).unwrap();
            assert_eq!(recorder.ids.lock().unwrap().last(), Some(&id));
        }
    }

    #[test]
    fn test_push_micro_batch_flushed_on_close() {
        let config = DispatchConfig {
            push_batch_size: 4,
            ..Default::default()
        };
        let core = DispatchCore::new(DispatchMode::Push, &config);
        let recorder = Arc::new(Recorder::default());
        core.register("rec", recorder.clone());

        core.submit_batch(events(10)).unwrap();
        assert_eq!(recorder.ids.lock().unwrap().len(), 8);
        assert_eq!(recorder.batches.load(Ordering::Relaxed), 2);

        core.close().unwrap();
        assert_eq!(*recorder.ids.lock().unwrap(), (1..=10).collect::<Vec<_>>());
        assert_eq!(recorder.batches.load(Ordering::Relaxed), 3);
        assert!(core.submit(events(1).remove(0)).is_err());
    }

    #[test]
    fn test_handler_error_surfaces() {
        let core = DispatchCore::new(DispatchMode::Push, &DispatchConfig::default());
        core.register("bad", Arc::new(Failing));
        let err = core.submit(events(1).remove(0)).unwrap_err();
        match err {
            DispatchError::Handler { handle, event_id, .. } => {
                assert_eq!(handle, "bad");
                assert_eq!(event_id, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unregistered_handler_not_called() {
        let core = DispatchCore::new(DispatchMode::Push, &DispatchConfig::default());
        let recorder = Arc::new(Recorder::default());
        core.register("rec", recorder.clone());
        core.submit(events(1).remove(0)).unwrap();
        assert!(core.unregister(&"rec".into()));
        core.submit_batch(events(3)).unwrap();
        assert_eq!(recorder.ids.lock().unwrap().len(), 1);
        assert_eq!(core.handler_count(), 0);
    }

    #[test]
    fn test_push_stops_after_cancellation() {
        let token = CancellationToken::new();
        let core = DispatchCore::with_cancellation(
            DispatchMode::Push,
            &DispatchConfig::default(),
            token.clone(),
        );
        let recorder = Arc::new(Recorder::default());
        core.register("rec", recorder.clone());

        core.submit_batch(events(3)).unwrap();
        token.cancel();
        let err = core.submit_batch(events(5000)).unwrap_err();

        assert!(matches!(err, DispatchError::Cancelled { event_id: 1 }));
        assert_eq!(recorder.ids.lock().unwrap().len(), 3);
        assert_eq!(core.total_submitted(), 3);
    }

    #[test]
    fn test_push_cancel_keeps_buffered_micro_batch_for_close() {
        let token = CancellationToken::new();
        let config = DispatchConfig {
            push_batch_size: 4,
            ..Default::default()
        };
        let core = DispatchCore::with_cancellation(DispatchMode::Push, &config, token.clone());
        let recorder = Arc::new(Recorder::default());
        core.register("rec", recorder.clone());

        core.submit_batch(events(6)).unwrap();
        token.cancel();
        assert!(core.submit_batch(events(10)).is_err());

        // accepted events still reach handlers on close
        core.close().unwrap();
        assert_eq!(*recorder.ids.lock().unwrap(), (1..=6).collect::<Vec<_>>());
    }

    #[test]
    fn test_pull_counts_concurrent_submitters() {
        let core = Arc::new(DispatchCore::new(
            DispatchMode::Pull,
            &DispatchConfig::default(),
        ));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let core = Arc::clone(&core);
                thread::spawn(move || {
                    core.submit_batch(events(250)).unwrap();
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(core.total_submitted(), 1000);
        assert_eq!(core.queue_len(), 1000);
    }

    #[test]
    fn test_pull_drop_newest_reported() {
        let config = DispatchConfig {
            queue_capacity: 5,
            backpressure: BackpressurePolicy::DropNewest,
            ..Default::default()
        };
        let core = DispatchCore::new(DispatchMode::Pull, &config);
        let summary = core.submit_batch(events(8)).unwrap();
        assert_eq!(summary, BatchSubmission { accepted: 5, dropped: 3 });
        let metrics = core.metrics();
        assert_eq!(metrics.submitted, 5);
        assert_eq!(metrics.dropped, 3);
    }

    #[test]
    fn test_pull_close_marks_end() {
        let core = DispatchCore::new(DispatchMode::Pull, &DispatchConfig::default());
        core.submit_batch(events(3)).unwrap();
        core.close().unwrap();
        let drained = core.drain(10);
        assert_eq!(drained.len(), 3);
        assert!(drained.end_of_stream);
        assert!(core.is_closed());
    }
}
