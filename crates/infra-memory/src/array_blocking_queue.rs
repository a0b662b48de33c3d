// Bounded FIFO container (Mutex + Condvar)
use batchq_core::domain::DomainError;
use batchq_core::error::{QueueError, Result};
use batchq_core::port::{Container, UNBOUNDED_CAPACITY};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::trace;

/// Slots reserved up front; larger containers grow on demand
const MAX_PREALLOCATED: usize = 1024;

/// Thread-safe FIFO container with an optional capacity limit.
///
/// Producers blocked in `offer_timeout` are woken whenever the worker drains
/// items out.
pub struct ArrayBlockingQueue<T> {
    items: Mutex<VecDeque<T>>,
    not_full: Condvar,
    capacity: Option<usize>,
}

impl<T> ArrayBlockingQueue<T> {
    /// Container holding at most `capacity` items
    ///
    /// # Errors
    /// `DomainError::InvalidArgument` if `capacity` is 0
    pub fn bounded(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(DomainError::InvalidArgument(
                "container capacity must be >= 1".to_string(),
            )
            .into());
        }
        Ok(Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(MAX_PREALLOCATED))),
            not_full: Condvar::new(),
            capacity: Some(capacity),
        })
    }

    /// Container without a capacity limit; offers never fail
    pub fn unbounded() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            not_full: Condvar::new(),
            capacity: None,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    // Queue contents stay consistent even if a holder panicked: every
    // mutation is a single VecDeque call.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn has_room(&self, items: &VecDeque<T>) -> bool {
        self.capacity.map_or(true, |capacity| items.len() < capacity)
    }
}

impl<T: Send> Container<T> for ArrayBlockingQueue<T> {
    fn offer(&self, item: T) -> bool {
        let mut items = self.lock();
        if !self.has_room(&items) {
            return false;
        }
        items.push_back(item);
        true
    }

    fn offer_timeout(&self, item: T, timeout: Duration) -> Result<bool> {
        let items = self.items.lock().map_err(|_| QueueError::Interrupted)?;
        let (mut items, wait) = self
            .not_full
            .wait_timeout_while(items, timeout, |items| !self.has_room(items))
            .map_err(|_| QueueError::Interrupted)?;

        if wait.timed_out() && !self.has_room(&items) {
            trace!(timeout_ms = timeout.as_millis() as u64, "Timed out waiting for capacity");
            return Ok(false);
        }
        items.push_back(item);
        Ok(true)
    }

    fn remaining_capacity(&self) -> usize {
        match self.capacity {
            Some(capacity) => capacity.saturating_sub(self.lock().len()),
            None => UNBOUNDED_CAPACITY,
        }
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn drain_to(&self, sink: &mut Vec<T>, max_items: usize) -> usize {
        let mut items = self.lock();
        let n = items.len().min(max_items);
        sink.extend(items.drain(..n));
        drop(items);

        if n > 0 {
            self.not_full.notify_all();
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_bounded_rejects_when_full() {
        let queue = ArrayBlockingQueue::bounded(2).unwrap();

        assert!(queue.offer(1));
        assert!(queue.offer(2));
        assert!(!queue.offer(3));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.remaining_capacity(), 0);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = ArrayBlockingQueue::<u32>::bounded(0).err().unwrap();
        assert!(err.to_string().contains("capacity must be >= 1"));
    }

    #[test]
    fn test_huge_capacity_does_not_preallocate() {
        let queue = ArrayBlockingQueue::bounded(usize::MAX).unwrap();

        assert!(queue.offer(1u8));
        assert_eq!(queue.remaining_capacity(), usize::MAX - 1);
    }

    #[test]
    fn test_poisoned_lock_interrupts_timed_offer() {
        let queue = Arc::new(ArrayBlockingQueue::bounded(4).unwrap());
        {
            let queue = queue.clone();
            let _ = thread::spawn(move || {
                let _items = queue.items.lock().unwrap();
                panic!("holder died");
            })
            .join();
        }

        let err = queue.offer_timeout(1, Duration::from_millis(10)).unwrap_err();
        assert!(err.is_interrupted());
        // Non-blocking paths recover the lock
        assert!(queue.offer(2));
    }

    #[test]
    fn test_unbounded_capacity() {
        let queue = ArrayBlockingQueue::unbounded();
        for i in 0..1000 {
            assert!(queue.offer(i));
        }

        assert_eq!(queue.remaining_capacity(), UNBOUNDED_CAPACITY);
        assert_eq!(queue.capacity(), None);
    }

    #[test]
    fn test_drain_preserves_order_and_respects_max() {
        let queue = ArrayBlockingQueue::bounded(10).unwrap();
        for c in ['a', 'b', 'c', 'd', 'e'] {
            queue.offer(c);
        }

        let mut batch = Vec::new();
        assert_eq!(queue.drain_to(&mut batch, 3), 3);
        assert_eq!(batch, vec!['a', 'b', 'c']);

        let mut rest = Vec::new();
        assert_eq!(queue.drain_to(&mut rest, 10), 2);
        assert_eq!(rest, vec!['d', 'e']);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_empty_returns_zero() {
        let queue: ArrayBlockingQueue<u8> = ArrayBlockingQueue::bounded(4).unwrap();
        let mut batch = Vec::new();

        assert_eq!(queue.drain_to(&mut batch, 4), 0);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_offer_timeout_expires_when_full() {
        let queue = ArrayBlockingQueue::bounded(1).unwrap();
        queue.offer(1);

        let started = Instant::now();
        let accepted = queue.offer_timeout(2, Duration::from_millis(50)).unwrap();

        assert!(!accepted);
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_offer_timeout_wakes_when_drained() {
        let queue = Arc::new(ArrayBlockingQueue::bounded(1).unwrap());
        queue.offer(1);

        let producer = {
            let queue = queue.clone();
            thread::spawn(move || queue.offer_timeout(2, Duration::from_secs(5)).unwrap())
        };

        thread::sleep(Duration::from_millis(50));
        let mut batch = Vec::new();
        queue.drain_to(&mut batch, 1);

        assert!(producer.join().unwrap());
        assert_eq!(batch, vec![1]);

        let mut rest = Vec::new();
        queue.drain_to(&mut rest, 1);
        assert_eq!(rest, vec![2]);
    }

    #[test]
    fn test_concurrent_producers_lose_nothing() {
        let queue = Arc::new(ArrayBlockingQueue::unbounded());
        let handles: Vec<_> = (0..4)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        assert!(queue.offer(p * 1000 + i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut all = Vec::new();
        queue.drain_to(&mut all, usize::MAX);
        assert_eq!(all.len(), 1000);

        // FIFO per producer
        for p in 0..4 {
            let mine: Vec<_> = all.iter().filter(|v| **v / 1000 == p).collect();
            assert!(mine.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
