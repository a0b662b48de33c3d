// Application Layer - lifecycle gate, batching policy and worker plumbing

pub mod batching;
pub mod lifecycle;
pub mod queue;
pub mod stats;
pub mod worker;

// Re-exports
pub use batching::BatchingQueueWorker;
pub use lifecycle::{LifecycleQueue, QueueBackend, WorkQueue};
pub use queue::BatchingWorkQueue;
pub use stats::QueueStats;
pub use worker::{shutdown_channel, QueueWorker, ShutdownSender, ShutdownToken, WorkerRunner};
