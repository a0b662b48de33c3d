// Queue statistics (lock-free counters)

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of a queue's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Items the container accepted
    pub items_accepted: u64,
    /// Items refused because the container was full (or the timed add expired)
    pub items_rejected: u64,
    /// Batches handed to the processor
    pub batches_processed: u64,
    /// Items handed to the processor
    pub items_processed: u64,
    /// Batches whose processor call returned an error or panicked
    pub batch_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct QueueCounters {
    items_accepted: AtomicU64,
    items_rejected: AtomicU64,
    batches_processed: AtomicU64,
    items_processed: AtomicU64,
    batch_failures: AtomicU64,
}

impl QueueCounters {
    pub(crate) fn record_offer(&self, accepted: bool) {
        if accepted {
            self.items_accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.items_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_batch(&self, item_count: usize, failed: bool) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
        self.items_processed
            .fetch_add(item_count as u64, Ordering::Relaxed);
        if failed {
            self.batch_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> QueueStats {
        QueueStats {
            items_accepted: self.items_accepted.load(Ordering::Relaxed),
            items_rejected: self.items_rejected.load(Ordering::Relaxed),
            batches_processed: self.batches_processed.load(Ordering::Relaxed),
            items_processed: self.items_processed.load(Ordering::Relaxed),
            batch_failures: self.batch_failures.load(Ordering::Relaxed),
        }
    }
}
