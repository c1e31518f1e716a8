//! Consumer-side capabilities
//!
//! `EventHandler` is what the dispatch core calls in push mode;
//! `EventConsumer` is the capability set shared by pull and push consumers.

use std::sync::Arc;

use crate::{ContractError, Event};

/// Push-mode callback target
///
/// Handlers run synchronously inside the producer's `submit` call. They must
/// finish in bounded time: the dispatch core applies no timeout, so a blocked
/// handler stalls production.
pub trait EventHandler: Send + Sync {
    /// Receive one event
    fn on_event(&self, event: &Event) -> Result<(), ContractError>;

    /// Receive a micro-batch assembled by the dispatch core
    fn on_batch(&self, events: &[Event]) -> Result<(), ContractError> {
        for event in events {
            self.on_event(event)?;
        }
        Ok(())
    }
}

impl<H: EventHandler + ?Sized> EventHandler for Arc<H> {
    fn on_event(&self, event: &Event) -> Result<(), ContractError> {
        (**self).on_event(event)
    }

    fn on_batch(&self, events: &[Event]) -> Result<(), ContractError> {
        (**self).on_batch(events)
    }
}

/// Capability set of an interchangeable consumer strategy
pub trait EventConsumer {
    /// Error surfaced once the consumer gives up
    type Error: std::error::Error + Send + Sync + 'static;

    /// Take ownership of one event
    fn accept(&mut self, event: Event) -> Result<(), Self::Error>;

    /// Persist everything accepted so far
    fn flush(&mut self) -> Result<(), Self::Error>;
}
