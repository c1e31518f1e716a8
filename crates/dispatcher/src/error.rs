//! Dispatch error types

use contracts::{ConsumerHandle, ContractError};
use thiserror::Error;

/// Dispatch-core errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Bounded queue full under the fail-fast policy
    #[error(transparent)]
    Capacity(ContractError),

    /// Submission after `close()`
    #[error("dispatch core closed, event {event_id} rejected")]
    Closed { event_id: u64 },

    /// Submission refused after cancellation
    ///
    /// Push refuses every event once cancelled; pull only when it would block.
    #[error("submission of event {event_id} cancelled")]
    Cancelled { event_id: u64 },

    /// A registered handler failed
    #[error("handler '{handle}' failed on event {event_id}: {source}")]
    Handler {
        handle: ConsumerHandle,
        event_id: u64,
        #[source]
        source: ContractError,
    },
}

impl DispatchError {
    /// Create a capacity error
    pub fn capacity(capacity: usize, event_id: u64) -> Self {
        Self::Capacity(ContractError::Capacity { capacity, event_id })
    }

    /// Create a handler error
    pub fn handler(handle: &ConsumerHandle, event_id: u64, source: ContractError) -> Self {
        Self::Handler {
            handle: handle.clone(),
            event_id,
            source,
        }
    }
}
