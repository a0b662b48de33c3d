// batchq Infrastructure - In-memory Adapters
// Implements: Container

mod array_blocking_queue;

pub use array_blocking_queue::ArrayBlockingQueue;
