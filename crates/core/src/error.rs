// Central Error Type for the Queue

use thiserror::Error;

/// Queue-level error type
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    /// Lifecycle misuse (start after shutdown, add while shutting down)
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A blocking wait was cut short (poisoned lock, closed container)
    #[error("Interrupted while waiting")]
    Interrupted,

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, QueueError::IllegalState(_))
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, QueueError::Interrupted)
    }
}

/// Result type alias using QueueError
pub type Result<T> = std::result::Result<T, QueueError>;
