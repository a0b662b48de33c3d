// batchq Core - Batching work queue: domain, ports and application logic
// NO container implementation here (Hexagonal Architecture)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use application::{BatchingWorkQueue, QueueStats, WorkQueue};
pub use domain::{BatchingQueueConfig, QueueSettings, QueueState};
pub use error::{QueueError, Result};
pub use port::{BatchProcessor, Container, ProcessError, UNBOUNDED_CAPACITY};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
