//! Navigation state over a history backend
//!
//! [`NavigationState`] keeps a cached mirror of the top of the screen stack and
//! reconciles two kinds of traversal notifications coming from the backend:
//!
//! - a pop this core requested through [`AppState::pop_state`], which resolves
//!   the returned [`PendingPop`], and
//! - a traversal the platform performed on its own (a back or forward
//!   control), which is broadcast as [`STATE_POPPED`].
//!
//! The backend delivers the same notification for both, so the handler tells
//! them apart by whether a pop correlation is pending. Exactly one of the two
//! paths runs per notification.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::sync::oneshot;

use super::address::{display_token, pure_address};
use super::backend::HistoryBackend;
use super::state::{NavState, Params, StateChange, StateRecord, Traversal};
use crate::error::{NavError, Result};
use crate::events::{EventBus, SubscriptionId};

/// Emitted after every push/replace with the old and new top of stack
pub const STATE_CHANGED: &str = "stateChanged";

/// Emitted when the backend reports a traversal this core did not request
pub const STATE_POPPED: &str = "statePopped";

/// Capability interface of a navigation state holder.
///
/// [`NavigationState`] is the implementation backed by a [`HistoryBackend`];
/// [`crate::screen::ScreenManager`] only depends on this trait.
pub trait AppState: Send + Sync + 'static {
    /// Push a screen, or replace the top entry if it has the same name.
    ///
    /// For the write operations, [`NavError::Subscriber`] means the write
    /// was applied and only a `stateChanged` subscriber failed.
    fn push_state(&self, name: &str, params: Option<Params>) -> Result<StateChange>;

    /// Replace the top entry unconditionally
    fn replace_state(&self, name: &str, params: Option<Params>) -> Result<StateChange>;

    /// Replace the parameters of the current screen
    fn change_params(&self, params: Option<Params>) -> Result<StateChange>;

    /// Request backward navigation. Fails with [`NavError::PopInProgress`]
    /// while a previous pop is still pending.
    fn pop_state(&self) -> Result<PendingPop>;

    /// Current top of stack
    fn peek_state(&self) -> Option<NavState>;

    /// Subscribe to [`STATE_CHANGED`] or [`STATE_POPPED`]
    fn on(
        &self,
        event: &str,
        callback: Box<dyn Fn(&StateChange) -> anyhow::Result<()> + Send + Sync>,
    ) -> SubscriptionId;

    fn off(&self, event: &str, id: SubscriptionId) -> bool;
}

/// Pop correlation: whether the next traversal notification answers a pop
/// this core requested.
enum PopCorrelation {
    Idle,
    Pending {
        old_state: Option<NavState>,
        resolve: oneshot::Sender<StateChange>,
    },
}

struct Slot {
    current: Option<NavState>,
    /// Stack position of `current`, 0 for an entry without an app record
    depth: usize,
    pop: PopCorrelation,
}

struct Shared {
    app_address: String,
    initial_length: usize,
    backend: Mutex<Box<dyn HistoryBackend>>,
    slot: Mutex<Slot>,
    events: EventBus<StateChange>,
}

/// What a notification resolved to, executed after the slot lock is released
enum Delivery {
    Resolve(oneshot::Sender<StateChange>, StateChange),
    Broadcast(StateChange),
}

/// Navigation state backed by a [`HistoryBackend`]. Cheap to clone.
#[derive(Clone)]
pub struct NavigationState {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for NavigationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.shared.lock_slot();
        f.debug_struct("NavigationState")
            .field("app_address", &self.shared.app_address)
            .field("current", &slot.current)
            .field("pop_pending", &matches!(slot.pop, PopCorrelation::Pending { .. }))
            .finish()
    }
}

impl Shared {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_backend(&self) -> MutexGuard<'_, Box<dyn HistoryBackend>> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle_notification(&self, record: Option<Value>) {
        let entry = record
            .as_ref()
            .and_then(|value| StateRecord::parse(value, &self.app_address));
        let depth = entry.as_ref().map_or(0, |entry| entry.depth);
        let new_state = entry.and_then(StateRecord::into_state);

        let delivery = {
            let mut slot = self.lock_slot();
            let traversal = if depth > slot.depth {
                Traversal::Forward
            } else {
                Traversal::Back
            };
            slot.depth = depth;
            let previous = std::mem::replace(&mut slot.current, new_state.clone());
            match std::mem::replace(&mut slot.pop, PopCorrelation::Idle) {
                PopCorrelation::Pending { old_state, resolve } => Delivery::Resolve(
                    resolve,
                    StateChange {
                        old_state,
                        new_state,
                        traversal: Some(traversal),
                    },
                ),
                PopCorrelation::Idle => Delivery::Broadcast(StateChange {
                    old_state: previous,
                    new_state,
                    traversal: Some(traversal),
                }),
            }
        };

        match delivery {
            Delivery::Resolve(resolve, change) => {
                debug!(
                    "NavigationState: pop resolved {:?} -> {:?}",
                    change.old_name(),
                    change.new_name()
                );
                if resolve.send(change).is_err() {
                    debug!("NavigationState: pop future was dropped before resolution");
                }
            }
            Delivery::Broadcast(change) => {
                info!(
                    "NavigationState: external {:?} {:?} -> {:?}",
                    change.traversal,
                    change.old_name(),
                    change.new_name()
                );
                // Nobody to propagate to from a backend callback
                if let Err(err) = self.events.emit(STATE_POPPED, &change) {
                    error!("NavigationState: {} subscriber failed: {}", STATE_POPPED, err);
                }
            }
        }
    }
}

impl NavigationState {
    /// Attach to `backend`, subscribing to its traversal notifications.
    ///
    /// `app_address` identifies this application's records; any query or
    /// fragment is stripped. The cached top of stack starts as whatever the
    /// backend currently holds for this application.
    pub fn new(mut backend: Box<dyn HistoryBackend>, app_address: &str) -> Result<Self> {
        let app_address = pure_address(app_address).to_string();
        let initial_length = backend.len()?;
        let entry = backend
            .current_entry()?
            .and_then(|value| StateRecord::parse(&value, &app_address));
        let depth = entry.as_ref().map_or(0, |entry| entry.depth);
        let current = entry.and_then(StateRecord::into_state);

        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            let weak = weak.clone();
            backend.subscribe(Arc::new(move |record: Option<Value>| match weak.upgrade() {
                Some(shared) => shared.handle_notification(record),
                None => warn!("NavigationState: notification after navigation state was dropped"),
            }));
            Shared {
                app_address,
                initial_length,
                backend: Mutex::new(backend),
                slot: Mutex::new(Slot {
                    current,
                    depth,
                    pop: PopCorrelation::Idle,
                }),
                events: EventBus::new(),
            }
        });

        debug!(
            "NavigationState: attached to '{}' (history length {})",
            shared.app_address, shared.initial_length
        );
        Ok(Self { shared })
    }

    /// Application address with query and fragment removed
    pub fn app_address(&self) -> &str {
        &self.shared.app_address
    }

    /// Number of history entries. Unless `all` is set, entries that existed
    /// before this navigation state was created are not counted.
    pub fn length(&self, all: bool) -> Result<usize> {
        let total = self.shared.lock_backend().len()?;
        Ok(if all {
            total
        } else {
            total.saturating_sub(self.shared.initial_length)
        })
    }

    /// Top of stack as the backend reports it right now, which may differ
    /// from [`AppState::peek_state`] while a traversal is in flight
    pub fn live_state(&self) -> Result<Option<NavState>> {
        let record = self.shared.lock_backend().current_entry()?;
        Ok(record.and_then(|value| StateRecord::decode(&value, &self.shared.app_address)))
    }

    /// Number of subscribers for `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.shared.events.listener_count(event)
    }

    /// Whether a pop is waiting for the backend
    pub fn pop_pending(&self) -> bool {
        matches!(self.shared.lock_slot().pop, PopCorrelation::Pending { .. })
    }

    /// Stack position of the current entry, counted from the entry the
    /// history held when this navigation state was created
    pub fn depth(&self) -> usize {
        self.shared.lock_slot().depth
    }

    fn write_state(
        &self,
        name: &str,
        params: Option<Params>,
        force_replace: bool,
    ) -> Result<StateChange> {
        let new_state = NavState::new(name, params)?;
        let token = display_token(new_state.name(), new_state.params());

        let change = {
            let mut slot = self.shared.lock_slot();
            let old_state = slot.current.clone();
            let same_screen = old_state.as_ref().is_some_and(|old| old.name() == name);
            let replace = force_replace || same_screen;
            let depth = if replace { slot.depth } else { slot.depth + 1 };
            let record =
                StateRecord::new(&self.shared.app_address, token.clone(), &new_state, depth)
                    .to_value()?;

            let mut backend = self.shared.lock_backend();
            if replace {
                debug!("NavigationState: replace -> '{}'", token);
                backend.replace(record, &token)?;
            } else {
                debug!("NavigationState: push -> '{}'", token);
                backend.push(record, &token)?;
            }
            drop(backend);

            slot.current = Some(new_state.clone());
            slot.depth = depth;
            StateChange {
                old_state,
                new_state: Some(new_state),
                traversal: None,
            }
        };

        self.shared.events.emit(STATE_CHANGED, &change)?;
        Ok(change)
    }
}

impl AppState for NavigationState {
    fn push_state(&self, name: &str, params: Option<Params>) -> Result<StateChange> {
        self.write_state(name, params, false)
    }

    fn replace_state(&self, name: &str, params: Option<Params>) -> Result<StateChange> {
        self.write_state(name, params, true)
    }

    fn change_params(&self, params: Option<Params>) -> Result<StateChange> {
        let current = self.peek_state().ok_or(NavError::EmptyStack)?;
        self.replace_state(current.name(), params)
    }

    fn pop_state(&self) -> Result<PendingPop> {
        let (tx, rx) = oneshot::channel();
        let old_state = {
            let mut slot = self.shared.lock_slot();
            if matches!(slot.pop, PopCorrelation::Pending { .. }) {
                return Err(NavError::PopInProgress);
            }
            let old_state = slot.current.clone();
            slot.pop = PopCorrelation::Pending {
                old_state: old_state.clone(),
                resolve: tx,
            };
            old_state
        };

        // The slot lock is released so a backend that notifies synchronously
        // can reach the handler
        let requested = self.shared.lock_backend().go_back();
        if let Err(err) = requested {
            let mut slot = self.shared.lock_slot();
            if matches!(slot.pop, PopCorrelation::Pending { .. }) {
                slot.pop = PopCorrelation::Idle;
            }
            return Err(err);
        }

        debug!(
            "NavigationState: pop requested from {:?}",
            old_state.as_ref().map(NavState::name)
        );
        Ok(PendingPop { old_state, rx })
    }

    fn peek_state(&self) -> Option<NavState> {
        self.shared.lock_slot().current.clone()
    }

    fn on(
        &self,
        event: &str,
        callback: Box<dyn Fn(&StateChange) -> anyhow::Result<()> + Send + Sync>,
    ) -> SubscriptionId {
        self.shared.events.on(event, callback)
    }

    fn off(&self, event: &str, id: SubscriptionId) -> bool {
        self.shared.events.off(event, id)
    }
}

/// Future returned by [`AppState::pop_state`], resolved by the backend's
/// traversal notification
#[derive(Debug)]
pub struct PendingPop {
    old_state: Option<NavState>,
    rx: oneshot::Receiver<StateChange>,
}

impl PendingPop {
    /// Top of stack when the pop was requested
    pub fn old_state(&self) -> Option<&NavState> {
        self.old_state.as_ref()
    }
}

impl Future for PendingPop {
    type Output = Result<StateChange>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.map_err(|_| {
                NavError::backend("navigation state dropped before the pop completed")
            })
        })
    }
}
