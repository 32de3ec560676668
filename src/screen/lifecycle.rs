use std::fmt;

use crate::nav::Params;

/// Lifecycle events fired on a screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenEvent {
    /// Screen became the top of the stack through a push, a replace or a
    /// forward traversal back onto it
    OpenScreen,

    /// Another screen was pushed, or traversed forward to, on top of this one
    ScreenSleep,

    /// The screen above was popped, this one is on top again
    AwakeScreen,

    /// Screen was replaced, popped or left by a back traversal
    ScreenClose,
}

impl ScreenEvent {
    pub const ALL: [ScreenEvent; 4] = [
        ScreenEvent::OpenScreen,
        ScreenEvent::ScreenSleep,
        ScreenEvent::AwakeScreen,
        ScreenEvent::ScreenClose,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScreenEvent::OpenScreen => "openScreen",
            ScreenEvent::ScreenSleep => "screenSleep",
            ScreenEvent::AwakeScreen => "awakeScreen",
            ScreenEvent::ScreenClose => "screenClose",
        }
    }

    /// State a screen is in after this event fired on it
    pub fn resulting_lifecycle(self) -> ScreenLifecycle {
        match self {
            ScreenEvent::OpenScreen | ScreenEvent::AwakeScreen => ScreenLifecycle::Open,
            ScreenEvent::ScreenSleep => ScreenLifecycle::Sleeping,
            ScreenEvent::ScreenClose => ScreenLifecycle::Closed,
        }
    }
}

impl fmt::Display for ScreenEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a screen, by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenLifecycle {
    /// Never opened, or closed by a replace, pop or back traversal
    #[default]
    Closed,

    /// On top of the stack
    Open,

    /// Covered by another screen, state preserved
    Sleeping,
}

/// Payload handed to lifecycle callbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub kind: ScreenEvent,
    pub screen: String,
    pub params: Option<Params>,
}

/// A screen object driven by [`crate::screen::ScreenManager::register_screen`].
///
/// Every hook defaults to doing nothing.
pub trait Screen: Send {
    fn open(&mut self, _event: &LifecycleEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn sleep(&mut self, _event: &LifecycleEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn awake(&mut self, _event: &LifecycleEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn close(&mut self, _event: &LifecycleEvent) -> anyhow::Result<()> {
        Ok(())
    }
}
