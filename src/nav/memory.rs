//! In-memory history backend
//!
//! Behaves like a browser session history: it starts with one host entry that
//! carries no record, `push` drops forward entries, and back/forward
//! traversals are queued and applied later by a [`HistoryDriver`], which then
//! notifies the subscribed listener.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;
use tokio::sync::mpsc;

use super::backend::{HistoryBackend, PopListener};
use super::state::Traversal;
use crate::error::{NavError, Result};

/// A single history entry
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub record: Option<Value>,
    pub display_token: String,
}

impl Traversal {
    fn delta(self) -> isize {
        match self {
            Traversal::Back => -1,
            Traversal::Forward => 1,
        }
    }
}

struct MemoryStack {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    /// Sum of deltas requested but not yet applied by the driver
    queued: isize,
    listener: Option<PopListener>,
}

impl MemoryStack {
    fn projected_cursor(&self) -> isize {
        self.cursor as isize + self.queued
    }
}

/// Cloneable handle to an in-memory history stack
#[derive(Clone)]
pub struct MemoryHistory {
    stack: Arc<Mutex<MemoryStack>>,
    traversals: mpsc::UnboundedSender<Traversal>,
}

impl std::fmt::Debug for MemoryHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stack = self.lock();
        f.debug_struct("MemoryHistory")
            .field("entries", &stack.entries)
            .field("cursor", &stack.cursor)
            .field("queued", &stack.queued)
            .finish()
    }
}

/// Applies queued traversals and delivers notifications
pub struct HistoryDriver {
    stack: Arc<Mutex<MemoryStack>>,
    traversals: mpsc::UnboundedReceiver<Traversal>,
    delay: Duration,
}

fn lock_stack(stack: &Mutex<MemoryStack>) -> MutexGuard<'_, MemoryStack> {
    stack.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryHistory {
    /// Create a history whose notifications are delivered without delay
    pub fn new() -> (Self, HistoryDriver) {
        Self::with_delay(Duration::ZERO)
    }

    /// Create a history whose driver waits `delay` before applying each
    /// traversal
    pub fn with_delay(delay: Duration) -> (Self, HistoryDriver) {
        let stack = Arc::new(Mutex::new(MemoryStack {
            entries: vec![HistoryEntry {
                record: None,
                display_token: String::new(),
            }],
            cursor: 0,
            queued: 0,
            listener: None,
        }));
        let (tx, rx) = mpsc::unbounded_channel();

        let history = Self {
            stack: Arc::clone(&stack),
            traversals: tx,
        };
        let driver = HistoryDriver {
            stack,
            traversals: rx,
            delay,
        };
        (history, driver)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStack> {
        lock_stack(&self.stack)
    }

    fn request(&self, traversal: Traversal) -> Result<()> {
        let mut stack = self.lock();
        let target = stack.projected_cursor() + traversal.delta();
        if target < 0 || target >= stack.entries.len() as isize {
            return Err(NavError::backend(match traversal {
                Traversal::Back => "no earlier history entry",
                Traversal::Forward => "no later history entry",
            }));
        }
        self.traversals
            .send(traversal)
            .map_err(|_| NavError::backend("history driver has shut down"))?;
        stack.queued += traversal.delta();
        debug!("MemoryHistory: queued {:?} (target index {})", traversal, target);
        Ok(())
    }

    /// Platform-initiated back navigation
    pub fn back(&self) -> Result<()> {
        self.request(Traversal::Back)
    }

    /// Platform-initiated forward navigation
    pub fn forward(&self) -> Result<()> {
        self.request(Traversal::Forward)
    }

    /// Snapshot of every entry, oldest first
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.lock().entries.clone()
    }

    /// Index of the current entry
    pub fn cursor(&self) -> usize {
        self.lock().cursor
    }

    /// Entries from the first one up to and including the current entry
    pub fn active_entries(&self) -> Vec<HistoryEntry> {
        let stack = self.lock();
        stack.entries[..=stack.cursor].to_vec()
    }
}

impl HistoryBackend for MemoryHistory {
    fn current_entry(&self) -> Result<Option<Value>> {
        let stack = self.lock();
        Ok(stack.entries[stack.cursor].record.clone())
    }

    fn push(&mut self, record: Value, display_token: &str) -> Result<()> {
        let mut stack = self.lock();
        let keep = stack.cursor + 1;
        stack.entries.truncate(keep);
        stack.entries.push(HistoryEntry {
            record: Some(record),
            display_token: display_token.to_string(),
        });
        stack.cursor += 1;
        debug!("MemoryHistory: push '{}' (length {})", display_token, stack.entries.len());
        Ok(())
    }

    fn replace(&mut self, record: Value, display_token: &str) -> Result<()> {
        let mut stack = self.lock();
        let cursor = stack.cursor;
        stack.entries[cursor] = HistoryEntry {
            record: Some(record),
            display_token: display_token.to_string(),
        };
        debug!("MemoryHistory: replace index {} with '{}'", cursor, display_token);
        Ok(())
    }

    fn go_back(&mut self) -> Result<()> {
        self.back()
    }

    fn len(&self) -> Result<usize> {
        Ok(self.lock().entries.len())
    }

    fn subscribe(&mut self, listener: PopListener) {
        self.lock().listener = Some(listener);
    }
}

impl HistoryDriver {
    /// Wait for the next queued traversal, apply it and notify.
    ///
    /// Returns false once every [`MemoryHistory`] handle has been dropped.
    pub async fn deliver_next(&mut self) -> bool {
        let Some(traversal) = self.traversals.recv().await else {
            return false;
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.apply(traversal);
        true
    }

    /// Apply every traversal queued so far, without delay
    pub fn deliver_pending(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(traversal) = self.traversals.try_recv() {
            self.apply(traversal);
            delivered += 1;
        }
        delivered
    }

    /// Deliver traversals until the history is dropped
    pub async fn run(mut self) {
        while self.deliver_next().await {}
        debug!("HistoryDriver: history dropped, stopping");
    }

    fn apply(&self, traversal: Traversal) {
        let (listener, record) = {
            let mut stack = lock_stack(&self.stack);
            stack.queued -= traversal.delta();
            let target = stack.cursor as isize + traversal.delta();
            if target < 0 || target >= stack.entries.len() as isize {
                warn!("HistoryDriver: dropping {:?}, index {} out of range", traversal, target);
                return;
            }
            stack.cursor = target as usize;
            debug!("HistoryDriver: applied {:?}, cursor now {}", traversal, stack.cursor);
            (
                stack.listener.clone(),
                stack.entries[stack.cursor].record.clone(),
            )
        };

        match listener {
            Some(listener) => listener(record),
            None => debug!("HistoryDriver: no listener subscribed"),
        }
    }
}
