//! Screen lifecycle driven by navigation state
//!
//! [`ScreenManager`] fires `openScreen`, `screenSleep`, `awakeScreen` and
//! `screenClose` on named screens as the stack changes. Pops it requested and
//! back traversals the platform performed on its own both close the old top
//! and wake the new one; a forward traversal puts the old top to sleep and
//! reopens the screen it returns to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use super::lifecycle::{LifecycleEvent, Screen, ScreenEvent, ScreenLifecycle};
use crate::error::{NavError, Result};
use crate::events::{EventBus, SubscriptionId};
use crate::nav::state::validate_name;
use crate::nav::{
    AppState, NavState, NavigationState, Params, STATE_POPPED, StateChange, Traversal,
};

#[derive(Default)]
struct ScreenSlot {
    events: EventBus<LifecycleEvent>,
    lifecycle: ScreenLifecycle,
}

/// Per-screen listeners and lifecycle, shared with the `statePopped` handler
#[derive(Clone, Default)]
struct ScreenRegistry {
    screens: Arc<Mutex<HashMap<String, ScreenSlot>>>,
}

impl ScreenRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ScreenSlot>> {
        self.screens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bus(&self, screen: &str) -> EventBus<LifecycleEvent> {
        self.lock()
            .entry(screen.to_string())
            .or_default()
            .events
            .clone()
    }

    fn lifecycle(&self, screen: &str) -> ScreenLifecycle {
        self.lock()
            .get(screen)
            .map(|slot| slot.lifecycle)
            .unwrap_or_default()
    }

    fn fire(&self, state: &NavState, kind: ScreenEvent) -> Result<()> {
        let bus = {
            let mut screens = self.lock();
            let slot = screens.entry(state.name().to_string()).or_default();
            slot.lifecycle = kind.resulting_lifecycle();
            slot.events.clone()
        };

        info!("ScreenManager: {} -> '{}'", kind, state.name());
        let event = LifecycleEvent {
            kind,
            screen: state.name().to_string(),
            params: state.params().cloned(),
        };
        bus.emit(kind.as_str(), &event)
    }

    /// Going back closes the old top and wakes the one beneath. Going
    /// forward puts the old top to sleep and reopens the screen that was
    /// closed when the history went back past it.
    ///
    /// Both events fire even if the first one fails; the first error wins.
    fn traversed(&self, change: &StateChange) -> Result<()> {
        let (leave, enter) = match change.traversal {
            Some(Traversal::Forward) => (ScreenEvent::ScreenSleep, ScreenEvent::OpenScreen),
            _ => (ScreenEvent::ScreenClose, ScreenEvent::AwakeScreen),
        };
        let left = match &change.old_state {
            Some(old) => self.fire(old, leave),
            None => Ok(()),
        };
        let entered = match &change.new_state {
            Some(new) => self.fire(new, enter),
            None => Ok(()),
        };
        left.and(entered)
    }
}

/// Maps screen names to lifecycle listeners and drives them from an
/// [`AppState`]
pub struct ScreenManager<S: AppState = NavigationState> {
    state: S,
    registry: ScreenRegistry,
    popped_subscription: SubscriptionId,
}

impl<S: AppState> std::fmt::Debug for ScreenManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut screens: Vec<_> = self
            .registry
            .lock()
            .iter()
            .map(|(name, slot)| (name.clone(), slot.lifecycle))
            .collect();
        screens.sort_by(|a, b| a.0.cmp(&b.0));
        f.debug_struct("ScreenManager")
            .field("current", &self.state.peek_state())
            .field("screens", &screens)
            .finish()
    }
}

impl<S: AppState> ScreenManager<S> {
    /// Wrap `state`, subscribing to its `statePopped` event so traversals
    /// the platform performs drive the same lifecycle as [`Self::pop_screen`]
    pub fn new(state: S) -> Self {
        let registry = ScreenRegistry::default();
        let handler_registry = registry.clone();
        let popped_subscription = state.on(
            STATE_POPPED,
            Box::new(move |change: &StateChange| -> anyhow::Result<()> {
                handler_registry.traversed(change)?;
                Ok(())
            }),
        );

        Self {
            state,
            registry,
            popped_subscription,
        }
    }

    /// The wrapped navigation state
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Current top of stack
    pub fn current_screen(&self) -> Option<NavState> {
        self.state.peek_state()
    }

    /// Last lifecycle state fired on `screen`
    pub fn lifecycle(&self, screen: &str) -> ScreenLifecycle {
        self.registry.lifecycle(screen)
    }

    /// Register a callback for `event` on `screen`. Callbacks for the same
    /// pair fire in registration order.
    pub fn add_screen_event<F>(
        &self,
        screen: &str,
        event: ScreenEvent,
        callback: F,
    ) -> SubscriptionId
    where
        F: Fn(&LifecycleEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        debug!("ScreenManager: '{}' listens for {}", screen, event);
        self.registry.bus(screen).on(event.as_str(), callback)
    }

    pub fn remove_screen_event(
        &self,
        screen: &str,
        event: ScreenEvent,
        id: SubscriptionId,
    ) -> bool {
        self.registry.bus(screen).off(event.as_str(), id)
    }

    /// Wire all four lifecycle events of `name` to a screen object
    pub fn register_screen<T>(&self, name: &str, screen: T) -> Arc<Mutex<T>>
    where
        T: Screen + 'static,
    {
        let screen = Arc::new(Mutex::new(screen));
        for kind in ScreenEvent::ALL {
            let target = Arc::clone(&screen);
            self.add_screen_event(name, kind, move |event| {
                let mut screen = target.lock().unwrap_or_else(PoisonError::into_inner);
                match kind {
                    ScreenEvent::OpenScreen => screen.open(event),
                    ScreenEvent::ScreenSleep => screen.sleep(event),
                    ScreenEvent::AwakeScreen => screen.awake(event),
                    ScreenEvent::ScreenClose => screen.close(event),
                }
            });
        }
        screen
    }

    /// Put the current screen to sleep and open `name` on top of it.
    ///
    /// Pushing the screen that is already on top only changes its parameters
    /// and fires no lifecycle events.
    pub fn push_screen(&self, name: &str, params: Option<Params>) -> Result<StateChange> {
        validate_name(name)?;
        let current = self.state.peek_state();

        if current.as_ref().is_some_and(|cur| cur.name() == name) {
            debug!("ScreenManager: '{}' already on top, updating params", name);
            return self.state.push_state(name, params);
        }

        let slept = match &current {
            Some(current) => self.registry.fire(current, ScreenEvent::ScreenSleep),
            None => Ok(()),
        };
        let written = self.state.push_state(name, params);
        self.settle(current.as_ref(), ScreenEvent::AwakeScreen, slept, written)
    }

    /// Close the current screen and open `name` in its place
    pub fn replace_screen(&self, name: &str, params: Option<Params>) -> Result<StateChange> {
        validate_name(name)?;

        let current = self.state.peek_state();
        let closed = match &current {
            Some(current) => self.registry.fire(current, ScreenEvent::ScreenClose),
            None => Ok(()),
        };
        let written = self.state.replace_state(name, params);
        self.settle(current.as_ref(), ScreenEvent::OpenScreen, closed, written)
    }

    /// Finish a push or replace once the write returned.
    ///
    /// If the write went through, even with a failing `stateChanged`
    /// subscriber, the new top is opened. Otherwise `previous` gets
    /// `restore` so it is on top and open again. The first error is returned.
    fn settle(
        &self,
        previous: Option<&NavState>,
        restore: ScreenEvent,
        before: Result<()>,
        written: Result<StateChange>,
    ) -> Result<StateChange> {
        match written {
            Ok(change) => {
                let opened = match &change.new_state {
                    Some(new) => self.registry.fire(new, ScreenEvent::OpenScreen),
                    None => Ok(()),
                };
                before?;
                opened?;
                Ok(change)
            }
            Err(err @ NavError::Subscriber { .. }) => {
                if let Some(new) = self.state.peek_state() {
                    if let Err(open_err) = self.registry.fire(&new, ScreenEvent::OpenScreen) {
                        warn!("ScreenManager: opening '{}' failed: {}", new.name(), open_err);
                    }
                }
                before?;
                Err(err)
            }
            Err(err) => {
                if let Some(previous) = previous {
                    if let Err(restore_err) = self.registry.fire(previous, restore) {
                        warn!(
                            "ScreenManager: restoring '{}' failed: {}",
                            previous.name(),
                            restore_err
                        );
                    }
                }
                before?;
                Err(err)
            }
        }
    }

    /// Close the current screen, pop it and wake the one beneath.
    ///
    /// Fails immediately with [`crate::NavError::PopInProgress`] if a pop is
    /// already pending; in that case no lifecycle event fires.
    pub async fn pop_screen(&self) -> Result<StateChange> {
        let pending = self.state.pop_state()?;

        let closed = match pending.old_state() {
            Some(old) => self.registry.fire(old, ScreenEvent::ScreenClose),
            None => Ok(()),
        };

        let change = pending.await?;
        if let Some(new) = &change.new_state {
            self.registry.fire(new, ScreenEvent::AwakeScreen)?;
        }
        closed?;
        Ok(change)
    }

    /// Change the parameters of the current screen without any lifecycle
    /// transition
    pub fn change_params(&self, params: Option<Params>) -> Result<StateChange> {
        self.state.change_params(params)
    }
}

impl<S: AppState> Drop for ScreenManager<S> {
    fn drop(&mut self) {
        self.state.off(STATE_POPPED, self.popped_subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::{
        HistoryBackend, HistoryDriver, MemoryHistory, PopListener, STATE_CHANGED, params,
    };
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};

    type Log = Arc<Mutex<Vec<String>>>;

    fn setup() -> (ScreenManager, MemoryHistory, HistoryDriver, Log) {
        let (history, driver) = MemoryHistory::new();
        let nav = NavigationState::new(Box::new(history.clone()), "app://test/").unwrap();
        let manager = ScreenManager::new(nav);
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        for screen in ["list", "detail", "settings"] {
            for kind in ScreenEvent::ALL {
                let log = Arc::clone(&log);
                manager.add_screen_event(screen, kind, move |event| {
                    log.lock().unwrap().push(format!("{}:{}", event.kind, event.screen));
                    Ok(())
                });
            }
        }
        (manager, history, driver, log)
    }

    fn take(log: &Log) -> Vec<String> {
        std::mem::take(&mut *log.lock().unwrap())
    }

    #[tokio::test]
    async fn test_push_push_pop_lifecycle() {
        let (manager, history, mut driver, log) = setup();

        manager.push_screen("list", None).unwrap();
        assert_eq!(take(&log), vec!["openScreen:list"]);

        manager.push_screen("detail", Some(params([("id", "42")]))).unwrap();
        assert_eq!(take(&log), vec!["screenSleep:list", "openScreen:detail"]);
        assert_eq!(history.active_entries().len(), 3);
        assert_eq!(manager.lifecycle("list"), ScreenLifecycle::Sleeping);

        let (change, _) = tokio::join!(manager.pop_screen(), driver.deliver_next());
        let change = change.unwrap();
        assert_eq!(change.old_name(), Some("detail"));
        assert_eq!(change.new_name(), Some("list"));
        assert_eq!(take(&log), vec!["screenClose:detail", "awakeScreen:list"]);
        assert_eq!(manager.lifecycle("detail"), ScreenLifecycle::Closed);
        assert_eq!(manager.lifecycle("list"), ScreenLifecycle::Open);
    }

    #[test]
    fn test_replace_closes_then_opens() {
        let (manager, _history, _driver, log) = setup();
        manager.push_screen("list", None).unwrap();
        take(&log);

        manager.replace_screen("settings", None).unwrap();
        assert_eq!(take(&log), vec!["screenClose:list", "openScreen:settings"]);
        assert_eq!(manager.current_screen().unwrap().name(), "settings");
    }

    #[test]
    fn test_change_params_fires_nothing() {
        let (manager, history, _driver, log) = setup();
        manager.push_screen("settings", None).unwrap();
        take(&log);

        let change = manager.change_params(Some(params([("tab", "profile")]))).unwrap();
        assert_eq!(change.new_state.unwrap().param("tab"), Some("profile"));
        assert!(take(&log).is_empty());
        assert_eq!(history.active_entries().len(), 2);
    }

    #[test]
    fn test_push_same_screen_only_updates_params() {
        let (manager, history, _driver, log) = setup();
        manager.push_screen("list", None).unwrap();
        take(&log);

        manager.push_screen("list", Some(params([("page", "2")]))).unwrap();
        assert!(take(&log).is_empty());
        assert_eq!(history.active_entries().len(), 2);
    }

    #[test]
    fn test_external_back_drives_lifecycle() {
        let (manager, history, mut driver, log) = setup();
        manager.push_screen("list", None).unwrap();
        manager.push_screen("detail", None).unwrap();
        take(&log);

        history.back().unwrap();
        driver.deliver_pending();

        assert_eq!(take(&log), vec!["screenClose:detail", "awakeScreen:list"]);
        assert_eq!(manager.current_screen().unwrap().name(), "list");
    }

    #[test]
    fn test_external_forward_sleeps_covered_screen() {
        let (manager, history, mut driver, log) = setup();
        manager.push_screen("list", None).unwrap();
        manager.push_screen("detail", None).unwrap();
        history.back().unwrap();
        driver.deliver_pending();
        take(&log);

        history.forward().unwrap();
        driver.deliver_pending();

        assert_eq!(take(&log), vec!["screenSleep:list", "openScreen:detail"]);
        assert_eq!(manager.lifecycle("list"), ScreenLifecycle::Sleeping);
        assert_eq!(manager.lifecycle("detail"), ScreenLifecycle::Open);

        // Going back again wakes a sleeping screen, never a closed one
        history.back().unwrap();
        driver.deliver_pending();
        assert_eq!(take(&log), vec!["screenClose:detail", "awakeScreen:list"]);
    }

    #[test]
    fn test_failing_state_changed_subscriber_still_opens_new_top() {
        let (manager, _history, _driver, log) = setup();
        manager.push_screen("list", None).unwrap();
        manager.state().on(
            STATE_CHANGED,
            Box::new(|_: &StateChange| -> anyhow::Result<()> {
                Err(anyhow::anyhow!("render failed"))
            }),
        );
        take(&log);

        let result = manager.push_screen("detail", None);
        assert!(matches!(result, Err(NavError::Subscriber { .. })));
        assert_eq!(take(&log), vec!["screenSleep:list", "openScreen:detail"]);
        assert_eq!(manager.current_screen().unwrap().name(), "detail");
        assert_eq!(manager.lifecycle("detail"), ScreenLifecycle::Open);
        assert_eq!(manager.lifecycle("list"), ScreenLifecycle::Sleeping);

        assert!(manager.replace_screen("settings", None).is_err());
        assert_eq!(take(&log), vec!["screenClose:detail", "openScreen:settings"]);
        assert_eq!(manager.lifecycle("settings"), ScreenLifecycle::Open);
    }

    #[test]
    fn test_failing_sleep_callback_still_opens_new_top() {
        let (manager, _history, _driver, log) = setup();
        manager.push_screen("list", None).unwrap();
        manager.add_screen_event("list", ScreenEvent::ScreenSleep, |_| {
            Err(anyhow::anyhow!("cannot sleep"))
        });
        take(&log);

        assert!(matches!(
            manager.push_screen("detail", None),
            Err(NavError::Subscriber { .. })
        ));
        assert_eq!(take(&log), vec!["screenSleep:list", "openScreen:detail"]);
        assert_eq!(manager.lifecycle("detail"), ScreenLifecycle::Open);
    }

    /// History that rejects writes while `fail` is set
    #[derive(Default)]
    struct FlakyHistory {
        entries: Vec<Value>,
        fail: Arc<AtomicBool>,
    }

    impl FlakyHistory {
        fn check(&self) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(NavError::BackendUnavailable("write rejected".into()));
            }
            Ok(())
        }
    }

    impl HistoryBackend for FlakyHistory {
        fn current_entry(&self) -> Result<Option<Value>> {
            Ok(self.entries.last().cloned())
        }

        fn push(&mut self, record: Value, _display_token: &str) -> Result<()> {
            self.check()?;
            self.entries.push(record);
            Ok(())
        }

        fn replace(&mut self, record: Value, _display_token: &str) -> Result<()> {
            self.check()?;
            self.entries.pop();
            self.entries.push(record);
            Ok(())
        }

        fn go_back(&mut self) -> Result<()> {
            self.check()
        }

        fn len(&self) -> Result<usize> {
            Ok(self.entries.len())
        }

        fn subscribe(&mut self, _listener: PopListener) {}
    }

    #[test]
    fn test_rejected_write_restores_previous_screen() {
        let fail = Arc::new(AtomicBool::new(false));
        let history = FlakyHistory {
            fail: Arc::clone(&fail),
            ..Default::default()
        };
        let nav = NavigationState::new(Box::new(history), "app://test/").unwrap();
        let manager = ScreenManager::new(nav);
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        for screen in ["list", "detail"] {
            for kind in ScreenEvent::ALL {
                let log = Arc::clone(&log);
                manager.add_screen_event(screen, kind, move |event| {
                    log.lock().unwrap().push(format!("{}:{}", event.kind, event.screen));
                    Ok(())
                });
            }
        }
        manager.push_screen("list", None).unwrap();
        take(&log);
        fail.store(true, Ordering::SeqCst);

        assert!(matches!(
            manager.push_screen("detail", None),
            Err(NavError::BackendUnavailable(_))
        ));
        assert_eq!(take(&log), vec!["screenSleep:list", "awakeScreen:list"]);
        assert_eq!(manager.lifecycle("list"), ScreenLifecycle::Open);
        assert_eq!(manager.lifecycle("detail"), ScreenLifecycle::Closed);

        assert!(manager.replace_screen("detail", None).is_err());
        assert_eq!(take(&log), vec!["screenClose:list", "openScreen:list"]);
        assert_eq!(manager.lifecycle("list"), ScreenLifecycle::Open);
        assert_eq!(manager.current_screen().unwrap().name(), "list");
    }

    #[test]
    fn test_invalid_push_fires_nothing() {
        let (manager, _history, _driver, log) = setup();
        manager.push_screen("list", None).unwrap();
        take(&log);

        assert!(matches!(manager.push_screen("", None), Err(NavError::InvalidArgument(_))));
        assert!(matches!(manager.replace_screen(" ", None), Err(NavError::InvalidArgument(_))));
        assert!(take(&log).is_empty());
    }

    #[tokio::test]
    async fn test_reentrant_pop_fires_nothing() {
        let (manager, _history, mut driver, log) = setup();
        manager.push_screen("list", None).unwrap();
        manager.push_screen("detail", None).unwrap();
        take(&log);

        let pending = manager.state().pop_state().unwrap();
        assert!(matches!(manager.pop_screen().await, Err(NavError::PopInProgress)));
        assert!(take(&log).is_empty());

        driver.deliver_pending();
        pending.await.unwrap();
    }

    #[derive(Default)]
    struct CountingScreen {
        opened: usize,
        closed: usize,
    }

    impl Screen for CountingScreen {
        fn open(&mut self, _event: &LifecycleEvent) -> anyhow::Result<()> {
            self.opened += 1;
            Ok(())
        }

        fn close(&mut self, _event: &LifecycleEvent) -> anyhow::Result<()> {
            self.closed += 1;
            Ok(())
        }
    }

    #[test]
    fn test_register_screen_object() {
        let (manager, _history, _driver, _log) = setup();
        let about = manager.register_screen("about", CountingScreen::default());

        manager.push_screen("about", None).unwrap();
        manager.replace_screen("list", None).unwrap();

        let about = about.lock().unwrap();
        assert_eq!(about.opened, 1);
        assert_eq!(about.closed, 1);
    }

    #[test]
    fn test_drop_unsubscribes_popped_handler() {
        let (history, _driver) = MemoryHistory::new();
        let nav = NavigationState::new(Box::new(history), "app://test/").unwrap();

        let manager = ScreenManager::new(nav.clone());
        assert_eq!(nav.listener_count(STATE_POPPED), 1);
        drop(manager);
        assert_eq!(nav.listener_count(STATE_POPPED), 0);
    }
}
