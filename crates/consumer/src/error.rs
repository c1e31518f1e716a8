//! Consumer error types

use contracts::ContractError;
use dispatcher::DispatchError;
use thiserror::Error;

/// Consumer-specific errors
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Persisting one batch failed on every allowed attempt
    #[error(
        "persisting {pending} events to '{store}' failed after {attempts} attempt(s), \
         {persisted} events persisted before the failure: {source}"
    )]
    RetriesExhausted {
        store: String,
        attempts: u32,
        persisted: u64,
        pending: usize,
        #[source]
        source: ContractError,
    },

    /// Dispatch-core failure seen by the consumer
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Sink error outside a batch write (e.g. close)
    #[error("sink error: {0}")]
    Contract(#[from] ContractError),
}

impl ConsumerError {
    /// Events safely persisted before the failure, when known
    pub fn persisted(&self) -> Option<u64> {
        match self {
            Self::RetriesExhausted { persisted, .. } => Some(*persisted),
            _ => None,
        }
    }

    /// Flatten into a contract error for the push callback boundary
    pub(crate) fn to_contract(&self) -> ContractError {
        match self {
            Self::RetriesExhausted { store, .. } => {
                ContractError::persistence(store.clone(), self.to_string())
            }
            other => ContractError::Other(other.to_string()),
        }
    }
}
