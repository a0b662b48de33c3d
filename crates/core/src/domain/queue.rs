// Queue Domain Model

use crate::domain::error::{DomainError, Result};
use std::sync::atomic::{AtomicU8, Ordering};

/// Queue identifier
pub type QueueId = String;

/// Lifecycle state of a work queue.
///
/// Strictly monotonic: `Created -> Started -> ShuttingDown -> Shutdown`.
/// `Created -> ShuttingDown` is also allowed (shutdown without start).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum QueueState {
    Created = 0,
    Started = 1,
    ShuttingDown = 2,
    Shutdown = 3,
}

impl QueueState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => QueueState::Created,
            1 => QueueState::Started,
            2 => QueueState::ShuttingDown,
            _ => QueueState::Shutdown,
        }
    }

    /// True once shutdown has been requested (items can no longer be added)
    pub fn is_terminating(self) -> bool {
        matches!(self, QueueState::ShuttingDown | QueueState::Shutdown)
    }

    fn can_transition_to(self, next: QueueState) -> bool {
        matches!(
            (self, next),
            (QueueState::Created, QueueState::Started)
                | (QueueState::Created, QueueState::ShuttingDown)
                | (QueueState::Started, QueueState::ShuttingDown)
                | (QueueState::ShuttingDown, QueueState::Shutdown)
        )
    }
}

impl std::fmt::Display for QueueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueState::Created => write!(f, "CREATED"),
            QueueState::Started => write!(f, "STARTED"),
            QueueState::ShuttingDown => write!(f, "SHUTTING_DOWN"),
            QueueState::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}

/// Atomic cell holding a [`QueueState`].
///
/// Reads are lock-free. Writers must be serialized by the caller (the
/// lifecycle gate holds its transition mutex while calling `transition`).
#[derive(Debug)]
pub struct AtomicQueueState(AtomicU8);

impl AtomicQueueState {
    pub fn new(state: QueueState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> QueueState {
        QueueState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next`, rejecting any backwards or skipping transition
    pub fn transition(&self, next: QueueState) -> Result<QueueState> {
        let current = self.load();
        if !current.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        self.0.store(next as u8, Ordering::Release);
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let state = AtomicQueueState::new(QueueState::Created);
        assert_eq!(state.transition(QueueState::Started).unwrap(), QueueState::Created);
        assert_eq!(
            state.transition(QueueState::ShuttingDown).unwrap(),
            QueueState::Started
        );
        assert_eq!(
            state.transition(QueueState::Shutdown).unwrap(),
            QueueState::ShuttingDown
        );
        assert_eq!(state.load(), QueueState::Shutdown);
    }

    #[test]
    fn test_no_path_back() {
        let state = AtomicQueueState::new(QueueState::Created);
        state.transition(QueueState::ShuttingDown).unwrap();
        state.transition(QueueState::Shutdown).unwrap();

        let err = state.transition(QueueState::Started).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidStateTransition {
                from: "SHUTDOWN".to_string(),
                to: "STARTED".to_string(),
            }
        );
        assert_eq!(state.load(), QueueState::Shutdown);
    }

    #[test]
    fn test_cannot_skip_shutting_down() {
        let state = AtomicQueueState::new(QueueState::Started);
        assert!(state.transition(QueueState::Shutdown).is_err());
        assert_eq!(state.load(), QueueState::Started);
    }

    #[test]
    fn test_terminating_states() {
        assert!(!QueueState::Created.is_terminating());
        assert!(!QueueState::Started.is_terminating());
        assert!(QueueState::ShuttingDown.is_terminating());
        assert!(QueueState::Shutdown.is_terminating());
    }
}
