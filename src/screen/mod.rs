pub mod lifecycle;
pub mod manager;

pub use lifecycle::{LifecycleEvent, Screen, ScreenEvent, ScreenLifecycle};
pub use manager::ScreenManager;
