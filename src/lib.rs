//! Screen stack and lifecycle management over a host back/forward history.
//!
//! - [`events::EventBus`]: named-event publish/subscribe used by every layer
//! - [`nav::NavigationState`]: the logical `(name, params)` stack mirrored onto a
//!   [`nav::HistoryBackend`], reconciling requested pops with traversals the
//!   platform performs on its own
//! - [`screen::ScreenManager`]: `openScreen`/`screenSleep`/`awakeScreen`/`screenClose`
//!   callbacks per screen name

pub mod config;
pub mod error;
pub mod events;
pub mod nav;
pub mod scenario;
pub mod screen;

pub use error::{NavError, Result};
