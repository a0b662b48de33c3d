// Container Port - bounded holding area shared by producers and the worker

use crate::error::Result;
use std::time::Duration;

/// `remaining_capacity()` of a container without a capacity limit
pub const UNBOUNDED_CAPACITY: usize = usize::MAX;

/// Concurrent FIFO container the queue buffers items in.
///
/// Implementations provide their own synchronization: producers call the
/// offer methods from any thread while the single worker calls `len`,
/// `is_empty` and `drain_to`.
pub trait Container<T>: Send + Sync {
    /// Insert `item` without blocking.
    ///
    /// Returns `false` (dropping the item) if the container is full.
    fn offer(&self, item: T) -> bool;

    /// Insert `item`, waiting up to `timeout` for free capacity.
    ///
    /// Returns `Ok(false)` if no space became available in time.
    ///
    /// # Errors
    /// - `QueueError::Interrupted` if the wait was cut short
    fn offer_timeout(&self, item: T, timeout: Duration) -> Result<bool>;

    /// Free slots left, or [`UNBOUNDED_CAPACITY`]
    fn remaining_capacity(&self) -> usize;

    /// Number of items currently held
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove up to `max_items` items from the head in one atomic step,
    /// appending them to `sink` in insertion order.
    ///
    /// Returns the number of items moved.
    fn drain_to(&self, sink: &mut Vec<T>, max_items: usize) -> usize;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Mutex, PoisonError};

    /// Non-blocking in-memory container for unit tests.
    ///
    /// `offer_timeout` never waits: a full container fails immediately.
    pub struct VecContainer<T> {
        items: Mutex<VecDeque<T>>,
        capacity: usize,
    }

    impl<T> VecContainer<T> {
        pub fn new(capacity: usize) -> Self {
            Self {
                items: Mutex::new(VecDeque::new()),
                capacity,
            }
        }

        pub fn unbounded() -> Self {
            Self::new(UNBOUNDED_CAPACITY)
        }

        fn items(&self) -> std::sync::MutexGuard<'_, VecDeque<T>> {
            self.items.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl<T: Clone> VecContainer<T> {
        /// Copy of the current contents, head first
        pub fn snapshot(&self) -> Vec<T> {
            self.items().iter().cloned().collect()
        }
    }

    impl<T: Send> Container<T> for VecContainer<T> {
        fn offer(&self, item: T) -> bool {
            let mut items = self.items();
            if items.len() >= self.capacity {
                return false;
            }
            items.push_back(item);
            true
        }

        fn offer_timeout(&self, item: T, _timeout: Duration) -> Result<bool> {
            Ok(self.offer(item))
        }

        fn remaining_capacity(&self) -> usize {
            if self.capacity == UNBOUNDED_CAPACITY {
                return UNBOUNDED_CAPACITY;
            }
            self.capacity.saturating_sub(self.items().len())
        }

        fn len(&self) -> usize {
            self.items().len()
        }

        fn drain_to(&self, sink: &mut Vec<T>, max_items: usize) -> usize {
            let mut items = self.items();
            let count = max_items.min(items.len());
            sink.extend(items.drain(..count));
            count
        }
    }
}
