//! EventQueue - thread-safe FIFO behind pull mode
//!
//! The end-of-stream marker is enqueued by `close()` after the last event and
//! is never removed, so every consumer draining the queue observes it.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{BackpressurePolicy, CancellationToken, Event};
use tracing::{debug, trace};

use crate::error::DispatchError;
use crate::metrics::DispatchMetrics;

/// How often a blocked producer wakes to check for cancellation
const BLOCK_WAKE_INTERVAL: Duration = Duration::from_millis(50);

/// Result of a successful `submit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Enqueued (pull) or delivered / buffered (push)
    Accepted,
    /// Rejected by the `DropNewest` policy and counted
    Dropped,
}

/// Result of one `drain` call
#[derive(Debug, Default)]
pub struct Drained {
    /// Removed events, FIFO order
    pub events: Vec<Event>,
    /// The end-of-stream marker is at the head of the queue
    pub end_of_stream: bool,
}

impl Drained {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

enum QueueItem {
    Event(Event),
    EndOfStream,
}

#[derive(Default)]
struct QueueState {
    items: VecDeque<QueueItem>,
    closed: bool,
}

impl QueueState {
    /// Events waiting, marker excluded
    fn depth(&self) -> usize {
        self.items.len() - usize::from(self.closed)
    }

    fn take(&mut self, max: usize) -> Drained {
        let mut events = Vec::with_capacity(max.min(self.depth()));
        while events.len() < max {
            match self.items.front() {
                Some(QueueItem::Event(_)) => {
                    if let Some(QueueItem::Event(event)) = self.items.pop_front() {
                        events.push(event);
                    }
                }
                Some(QueueItem::EndOfStream) | None => break,
            }
        }
        let end_of_stream = matches!(self.items.front(), Some(QueueItem::EndOfStream));
        Drained {
            events,
            end_of_stream,
        }
    }
}

/// Bounded or unbounded FIFO with explicit backpressure
pub struct EventQueue {
    state: Mutex<QueueState>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: Option<usize>,
    policy: BackpressurePolicy,
    metrics: Arc<DispatchMetrics>,
}

impl EventQueue {
    /// Create a queue; `capacity = None` means unbounded
    pub fn new(
        capacity: Option<usize>,
        policy: BackpressurePolicy,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
            policy,
            metrics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue one event, applying the backpressure policy when full
    pub fn push(
        &self,
        event: Event,
        cancel: &CancellationToken,
    ) -> Result<SubmitOutcome, DispatchError> {
        let mut state = self.lock();
        if state.closed {
            return Err(DispatchError::Closed { event_id: event.id });
        }

        if let Some(capacity) = self.capacity {
            let mut waited = false;
            while state.depth() >= capacity {
                match self.policy {
                    BackpressurePolicy::FailFast => {
                        return Err(DispatchError::capacity(capacity, event.id));
                    }
                    BackpressurePolicy::DropNewest => {
                        self.metrics.inc_dropped();
                        trace!(event_id = event.id, capacity, "queue full, event dropped");
                        return Ok(SubmitOutcome::Dropped);
                    }
                    BackpressurePolicy::Block => {
                        if !waited {
                            waited = true;
                            self.metrics.inc_backpressure_waits();
                        }
                        if cancel.is_cancelled() {
                            return Err(DispatchError::Cancelled { event_id: event.id });
                        }
                        state = self
                            .not_full
                            .wait_timeout(state, BLOCK_WAKE_INTERVAL)
                            .unwrap_or_else(PoisonError::into_inner)
                            .0;
                        if state.closed {
                            return Err(DispatchError::Closed { event_id: event.id });
                        }
                    }
                }
            }
        }

        state.items.push_back(QueueItem::Event(event));
        self.metrics.observe_queue_depth(state.depth());
        drop(state);
        self.not_empty.notify_one();
        Ok(SubmitOutcome::Accepted)
    }

    /// Remove up to `max` events without blocking
    pub fn drain(&self, max: usize) -> Drained {
        let drained = self.lock().take(max);
        if !drained.is_empty() {
            self.not_full.notify_all();
        }
        drained
    }

    /// Like `drain`, but waits up to `timeout` while the queue holds nothing
    pub fn drain_timeout(&self, max: usize, timeout: Duration) -> Drained {
        let state = self.lock();
        let (mut state, _) = self
            .not_empty
            .wait_timeout_while(state, timeout, |s| s.items.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        let drained = state.take(max);
        drop(state);
        if !drained.is_empty() {
            self.not_full.notify_all();
        }
        drained
    }

    /// Append the end-of-stream marker (idempotent)
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        state.items.push_back(QueueItem::EndOfStream);
        debug!(remaining = state.depth(), "queue closed");
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Events currently waiting
    pub fn len(&self) -> usize {
        self.lock().depth()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
