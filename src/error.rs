use thiserror::Error;

/// Errors produced by the navigation core.
#[derive(Debug, Error)]
pub enum NavError {
    /// Empty or missing screen name passed to push/replace
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `change_params` with no current screen
    #[error("no screen set, stack empty")]
    EmptyStack,

    /// A second pop was requested while one is still waiting for the backend
    #[error("pop already in progress")]
    PopInProgress,

    /// The history backend is missing or one of its primitives failed
    #[error("history backend unavailable: {0}")]
    BackendUnavailable(String),

    /// An event subscriber returned an error
    #[error("subscriber for '{event}' failed: {source}")]
    Subscriber {
        event: String,
        #[source]
        source: anyhow::Error,
    },

    /// A history record could not be encoded or decoded
    #[error("invalid history record: {0}")]
    Record(#[from] serde_json::Error),
}

impl NavError {
    pub(crate) fn backend(message: impl Into<String>) -> Self {
        Self::BackendUnavailable(message.into())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
