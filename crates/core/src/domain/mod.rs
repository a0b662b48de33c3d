// Domain Layer - Configuration, queue state and errors

pub mod config;
pub mod error;
pub mod queue;

// Re-exports
pub use config::{validate_queue_name, BatchingQueueConfig, QueueSettings, MAX_QUEUE_NAME_LEN};
pub use error::DomainError;
pub use queue::{AtomicQueueState, QueueId, QueueState};
