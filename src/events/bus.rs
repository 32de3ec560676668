//! Named-event publish/subscribe
//!
//! Handlers are stored per event name in registration order and are invoked
//! synchronously by [`EventBus::emit`]. The handler list is snapshotted before
//! dispatch, so handlers may register, unregister or emit without deadlocking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error};

use crate::error::{NavError, Result};

/// Handler invoked with the event payload
pub type Callback<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`EventBus::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Cloneable handle to a shared set of event subscriptions
pub struct EventBus<E> {
    inner: Arc<Mutex<BusInner<E>>>,
}

struct BusInner<E> {
    next_id: u64,
    handlers: HashMap<String, Vec<(SubscriptionId, Callback<E>)>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        let mut names: Vec<_> = inner.handlers.keys().collect();
        names.sort();
        f.debug_struct("EventBus").field("events", &names).finish()
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                next_id: 0,
                handlers: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusInner<E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a handler for `event`. Handlers are never deduplicated.
    pub fn on<F>(&self, event: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let event = event.into();
        let mut inner = self.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        debug!("EventBus: subscribing {:?} to '{}'", id, event);
        inner
            .handlers
            .entry(event)
            .or_insert_with(Vec::new)
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a handler. Returns false if it was not registered under `event`.
    pub fn off(&self, event: &str, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let Some(list) = inner.handlers.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            inner.handlers.remove(event);
        }
        removed
    }

    /// Number of handlers registered for `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().handlers.get(event).map_or(0, Vec::len)
    }

    /// Invoke every handler for `event` in registration order.
    ///
    /// Stops at the first handler that fails and returns
    /// [`NavError::Subscriber`]; the remaining handlers are not called.
    pub fn emit(&self, event: &str, data: &E) -> Result<()> {
        let handlers: Vec<Callback<E>> = match self.lock().handlers.get(event) {
            Some(list) => list.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return Ok(()),
        };

        debug!("EventBus: emitting '{}' to {} handler(s)", event, handlers.len());
        for handler in handlers {
            if let Err(source) = handler(data) {
                error!("EventBus: handler for '{}' failed: {:#}", event, source);
                return Err(NavError::Subscriber {
                    event: event.to_string(),
                    source,
                });
            }
        }
        Ok(())
    }
}
