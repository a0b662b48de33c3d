// Batch Processor Port - user-supplied routine receiving each drained batch

/// Error type a processor may fail with (caught and logged by the worker)
pub type ProcessError = Box<dyn std::error::Error + Send + Sync>;

/// Processes one batch of items.
///
/// Called only from the queue's worker thread, one batch at a time, with
/// items in insertion order. A returned error (or a panic) is logged and the
/// batch is dropped: there is no retry and no re-enqueue.
pub trait BatchProcessor<T>: Send + Sync {
    fn process(&self, batch: Vec<T>) -> Result<(), ProcessError>;
}

impl<T, F> BatchProcessor<T> for F
where
    F: Fn(Vec<T>) -> Result<(), ProcessError> + Send + Sync,
{
    fn process(&self, batch: Vec<T>) -> Result<(), ProcessError> {
        self(batch)
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Condvar, Mutex, PoisonError};
    use std::time::{Duration, Instant};

    /// Mock processor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed
        Success,
        /// Always fail with message
        Fail(String),
        /// Panic with message (for panic isolation testing)
        Panic(String),
    }

    /// A batch as seen by [`RecordingProcessor`]
    #[derive(Debug, Clone)]
    pub struct ProcessedBatch<T> {
        pub processed_at: Instant,
        pub items: Vec<T>,
    }

    /// Processor that records every batch it receives (also the failing and
    /// panicking ones) and lets tests block until N batches have arrived.
    pub struct RecordingProcessor<T> {
        batches: Mutex<Vec<ProcessedBatch<T>>>,
        arrived: Condvar,
        behavior: Mutex<MockBehavior>,
        call_count: AtomicUsize,
    }

    impl<T> RecordingProcessor<T> {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                arrived: Condvar::new(),
                behavior: Mutex::new(behavior),
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }

        pub fn new_panic_inducing(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Panic(message.into()))
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Block until at least `count` batches were received or `timeout`
        /// elapsed. Returns whether the count was reached.
        pub fn wait_for_batches(&self, count: usize, timeout: Duration) -> bool {
            let batches = self.batches.lock().unwrap_or_else(PoisonError::into_inner);
            let (batches, _) = self
                .arrived
                .wait_timeout_while(batches, timeout, |batches| batches.len() < count)
                .unwrap_or_else(PoisonError::into_inner);
            batches.len() >= count
        }
    }

    impl<T: Clone> RecordingProcessor<T> {
        pub fn batches(&self) -> Vec<ProcessedBatch<T>> {
            self.batches
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Item lists only, in processing order
        pub fn batch_items(&self) -> Vec<Vec<T>> {
            self.batches().into_iter().map(|batch| batch.items).collect()
        }
    }

    impl<T: Send> BatchProcessor<T> for RecordingProcessor<T> {
        fn process(&self, batch: Vec<T>) -> Result<(), ProcessError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            {
                let mut batches = self.batches.lock().unwrap_or_else(PoisonError::into_inner);
                batches.push(ProcessedBatch {
                    processed_at: Instant::now(),
                    items: batch,
                });
                self.arrived.notify_all();
            }

            let behavior = self
                .behavior
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();

            match behavior {
                MockBehavior::Success => Ok(()),
                MockBehavior::Fail(msg) => Err(msg.into()),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
            }
        }
    }
}
