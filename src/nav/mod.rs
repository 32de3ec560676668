pub mod address;
pub mod backend;
pub mod memory;
pub mod navigation;
pub mod state;

pub use address::{display_token, pure_address};
pub use backend::{HistoryBackend, PopListener};
pub use memory::{HistoryDriver, HistoryEntry, MemoryHistory};
pub use navigation::{AppState, NavigationState, PendingPop, STATE_CHANGED, STATE_POPPED};
pub use state::{NavState, Params, StateChange, StateRecord, Traversal, params};
