//! The platform history mechanism as seen by the navigation core

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;

/// Called by the backend with the new current record after a back/forward
/// traversal it performed. `None` means the entry carries no record.
pub type PopListener = Arc<dyn Fn(Option<Value>) + Send + Sync>;

/// An externally owned, ordered stack of opaque records with asynchronous
/// back/forward traversal.
///
/// `push` and `replace` take effect immediately and never notify. `go_back`
/// only requests a traversal: the backend applies it later and then invokes
/// the subscribed [`PopListener`]. Traversals triggered by the platform itself
/// (a hardware or browser back control) produce the same notification.
pub trait HistoryBackend: Send {
    /// Record of the current entry, if it has one
    fn current_entry(&self) -> Result<Option<Value>>;

    /// Append a record after the current entry, discarding forward entries
    fn push(&mut self, record: Value, display_token: &str) -> Result<()>;

    /// Overwrite the current entry
    fn replace(&mut self, record: Value, display_token: &str) -> Result<()>;

    /// Request backward navigation
    fn go_back(&mut self) -> Result<()>;

    /// Total number of entries, including ones that predate the application
    fn len(&self) -> Result<usize>;

    /// Install the traversal listener, replacing any previous one
    fn subscribe(&mut self, listener: PopListener);
}
