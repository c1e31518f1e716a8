//! HandlerRegistry - ordered push-mode callback list

use std::sync::{Arc, PoisonError, RwLock};

use contracts::{ConsumerHandle, EventHandler};
use tracing::{debug, warn};

/// One registered handler
#[derive(Clone)]
pub struct Registration {
    pub handle: ConsumerHandle,
    pub handler: Arc<dyn EventHandler>,
}

/// Registration-ordered handler list
///
/// Submissions clone the current `Arc` under the read lock and invoke
/// handlers without holding it, so (un)registration never tears a delivery.
/// Writers copy the list and swap it in.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: RwLock<Arc<Vec<Registration>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler
    ///
    /// Registering an existing handle replaces its handler in place and keeps
    /// its position in the delivery order.
    pub fn register(&self, handle: ConsumerHandle, handler: Arc<dyn EventHandler>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let list = Arc::make_mut(&mut *entries);
        if let Some(existing) = list.iter_mut().find(|r| r.handle == handle) {
            warn!(handle = %handle, "handler re-registered, replacing");
            existing.handler = handler;
            return;
        }
        debug!(handle = %handle, position = list.len(), "handler registered");
        list.push(Registration { handle, handler });
    }

    /// Remove a handler, returns whether it was registered
    pub fn unregister(&self, handle: &ConsumerHandle) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if !entries.iter().any(|r| &r.handle == handle) {
            return false;
        }
        Arc::make_mut(&mut *entries).retain(|r| &r.handle != handle);
        debug!(handle = %handle, "handler unregistered");
        true
    }

    /// Current handler set, shared until the next (un)registration
    pub fn snapshot(&self) -> Arc<Vec<Registration>> {
        Arc::clone(&self.entries.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Handles in delivery order
    pub fn handles(&self) -> Vec<ConsumerHandle> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|r| r.handle.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
