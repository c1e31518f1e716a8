//! EventSink trait - Bulk persister output interface
//!
//! Defines the abstract interface for durable batch stores.

use crate::{ContractError, Event};

/// Batch output trait
///
/// All store implementations must implement this trait. Each call to
/// [`EventSink::persist`] is one block write covering the whole batch.
pub trait EventSink: Send {
    /// Store name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Durably write every record of the batch in a single block operation
    ///
    /// An empty batch is a no-op and must not count as a write.
    ///
    /// # Errors
    /// Returns [`ContractError::Persistence`] when the store is unavailable or
    /// the block could not be committed. Nothing of the batch is visible then.
    fn persist(&mut self, batch: &[Event]) -> Result<(), ContractError>;

    /// Release the underlying storage handle
    fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn persist(&mut self, batch: &[Event]) -> Result<(), ContractError> {
        (**self).persist(batch)
    }

    fn close(&mut self) -> Result<(), ContractError> {
        (**self).close()
    }
}
