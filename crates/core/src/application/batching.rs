//! Batching policy engine
//!
//! Decides on every worker cycle whether to drain the container, how much to
//! drain, and how long to idle afterwards:
//! - flush as soon as `min_batch_size` items are waiting
//! - flush a partial batch once `max_write_delay` has passed since the last
//!   successful drain
//! - never hand more than `max_batch_size` items to one processor call
//! - pause `min_write_delay` between cycles, and poll an empty container
//!   every `sleep_interval_when_empty`
//! - on shutdown, drain everything that is left

use crate::application::stats::QueueCounters;
use crate::application::worker::{execute_guarded, PanicGuardResult, QueueWorker, ShutdownToken};
use crate::domain::BatchingQueueConfig;
use crate::error::Result;
use crate::port::{BatchProcessor, Container, TimeProvider};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Worker of a batching queue.
///
/// Owned by the worker thread once the queue starts; the timing cursors are
/// plain fields because nothing else touches them.
pub struct BatchingQueueWorker<T> {
    queue_name: String,
    config: Arc<BatchingQueueConfig>,
    container: Arc<dyn Container<T>>,
    processor: Arc<dyn BatchProcessor<T>>,
    time_provider: Arc<dyn TimeProvider>,
    stats: Arc<QueueCounters>,
    last_processing: i64,
    last_work_done: i64,
}

impl<T: Send> BatchingQueueWorker<T> {
    pub(crate) fn new(
        config: Arc<BatchingQueueConfig>,
        container: Arc<dyn Container<T>>,
        processor: Arc<dyn BatchProcessor<T>>,
        time_provider: Arc<dyn TimeProvider>,
        stats: Arc<QueueCounters>,
    ) -> Self {
        let now = time_provider.now_millis();
        Self {
            queue_name: config.queue_name().to_string(),
            config,
            container,
            processor,
            time_provider,
            stats,
            last_processing: now,
            last_work_done: now,
        }
    }

    /// Time (ms) of the last drain decision
    pub fn last_processing(&self) -> i64 {
        self.last_processing
    }

    /// Time (ms) of the last non-empty drain
    pub fn last_work_done(&self) -> i64 {
        self.last_work_done
    }

    /// Drain and process if the size or age threshold is met.
    ///
    /// With `force_all` every threshold is ignored and the container is
    /// drained batch by batch until empty. Returns the number of batches
    /// handed to the processor.
    pub(crate) fn process_items(&mut self, force_all: bool) -> usize {
        self.last_processing = self.time_provider.now_millis();
        if self.last_processing < self.last_work_done {
            debug!(
                queue_name = %self.queue_name,
                step_back_ms = self.last_work_done - self.last_processing,
                "Clock moved backwards, restarting batch age"
            );
            self.last_work_done = self.last_processing;
        }

        if !force_all && !self.is_due() {
            return 0;
        }

        let mut batches = 0;
        loop {
            let max_batch_size = self.config.max_batch_size();
            let mut batch = Vec::with_capacity(max_batch_size.min(self.container.len()));
            if self.container.drain_to(&mut batch, max_batch_size) == 0 {
                break;
            }
            self.last_work_done = self.time_provider.now_millis();
            self.process_batch(batch, max_batch_size);
            batches += 1;

            if !force_all || self.container.is_empty() {
                break;
            }
        }
        batches
    }

    fn is_due(&self) -> bool {
        let queue_size = self.container.len();
        if queue_size == 0 {
            return false;
        }

        let min_batch_size = self.config.min_batch_size();
        if queue_size >= min_batch_size {
            debug!(
                queue_name = %self.queue_name,
                queue_size,
                min_batch_size,
                "Queue size greater than or equal to min_batch_size"
            );
            return true;
        }

        let max_write_delay_ms = duration_millis(self.config.max_write_delay());
        let time_passed_ms = self.last_processing.saturating_sub(self.last_work_done);
        if time_passed_ms > max_write_delay_ms {
            debug!(
                queue_name = %self.queue_name,
                max_write_delay_ms,
                time_passed_ms,
                "More than max_write_delay has passed since items were last processed"
            );
            return true;
        }

        false
    }

    fn process_batch(&self, batch: Vec<T>, max_batch_size: usize) {
        let item_count = batch.len();
        debug!(
            queue_name = %self.queue_name,
            item_count,
            queue_size = self.container.len(),
            max_batch_size,
            "Processing items..."
        );

        let processor = &self.processor;
        let failed = match execute_guarded(AssertUnwindSafe(|| processor.process(batch))) {
            PanicGuardResult::Success(Ok(())) => false,
            PanicGuardResult::Success(Err(e)) => {
                warn!(
                    queue_name = %self.queue_name,
                    item_count,
                    error = %e,
                    "Exception caught when processing items"
                );
                true
            }
            PanicGuardResult::Panicked(panic_msg) => {
                warn!(
                    queue_name = %self.queue_name,
                    item_count,
                    panic_msg = %panic_msg,
                    "Batch processor panicked"
                );
                true
            }
        };
        self.stats.record_batch(item_count, failed);
    }

    /// Idle between cycles: `min_write_delay` first, then poll while empty
    pub(crate) fn wait_for_more_work(&self, shutdown: &ShutdownToken) -> Result<()> {
        let min_delay = self.config.min_write_delay();
        if !min_delay.is_zero() {
            debug!(
                queue_name = %self.queue_name,
                min_delay_ms = duration_millis(min_delay),
                "Sleeping..."
            );
            shutdown.wait_timeout(min_delay)?;
        }

        while !shutdown.is_shutdown() && self.container.is_empty() {
            let sleep_interval = self.config.sleep_interval_when_empty();
            if sleep_interval.is_zero() {
                break;
            }
            debug!(
                queue_name = %self.queue_name,
                sleep_interval_when_empty_ms = duration_millis(sleep_interval),
                "Queue empty, sleeping..."
            );
            shutdown.wait_timeout(sleep_interval)?;
        }
        Ok(())
    }
}

impl<T: Send> QueueWorker for BatchingQueueWorker<T> {
    fn do_work(&mut self, shutdown: &ShutdownToken) -> Result<()> {
        self.process_items(false);
        self.wait_for_more_work(shutdown)
    }

    fn do_shutdown_work(&mut self) {
        let batches = self.process_items(true);
        debug!(queue_name = %self.queue_name, batches, "Drained queue on shutdown");
    }
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::worker::{shutdown_channel, WorkerRunner};
    use crate::domain::QueueSettings;
    use crate::port::batch_processor::mocks::RecordingProcessor;
    use crate::port::container::mocks::VecContainer;
    use crate::port::time_provider::mocks::ManualTimeProvider;
    use std::time::Instant;

    struct Fixture {
        config: Arc<BatchingQueueConfig>,
        container: Arc<VecContainer<u32>>,
        processor: Arc<RecordingProcessor<u32>>,
        clock: Arc<ManualTimeProvider>,
        stats: Arc<QueueCounters>,
    }

    impl Fixture {
        fn new(min_batch: usize, max_batch: usize, min_delay_ms: u64, max_delay_ms: u64) -> Self {
            Self::with_processor(
                min_batch,
                max_batch,
                min_delay_ms,
                max_delay_ms,
                RecordingProcessor::new_success(),
            )
        }

        fn with_processor(
            min_batch: usize,
            max_batch: usize,
            min_delay_ms: u64,
            max_delay_ms: u64,
            processor: RecordingProcessor<u32>,
        ) -> Self {
            let config = BatchingQueueConfig::new(QueueSettings {
                queue_name: "test-queue".to_string(),
                min_batch_size: min_batch,
                max_batch_size: max_batch,
                min_write_delay_ms: min_delay_ms,
                max_write_delay_ms: max_delay_ms,
                sleep_interval_when_empty_ms: 10,
                wait_for_completion_on_shutdown: true,
            })
            .unwrap();
            Self {
                config: Arc::new(config),
                container: Arc::new(VecContainer::new(100)),
                processor: Arc::new(processor),
                clock: Arc::new(ManualTimeProvider::new(1_000_000)),
                stats: Arc::new(QueueCounters::default()),
            }
        }

        fn worker(&self) -> BatchingQueueWorker<u32> {
            BatchingQueueWorker::new(
                self.config.clone(),
                self.container.clone(),
                self.processor.clone(),
                self.clock.clone(),
                self.stats.clone(),
            )
        }

        fn add(&self, items: impl IntoIterator<Item = u32>) {
            for item in items {
                assert!(self.container.offer(item));
            }
        }
    }

    #[test]
    fn test_below_min_batch_and_young_does_nothing() {
        let fixture = Fixture::new(10, 10, 0, 200);
        let mut worker = fixture.worker();
        fixture.add([1, 2]);

        fixture.clock.advance(Duration::from_millis(100));

        assert_eq!(worker.process_items(false), 0);
        assert_eq!(fixture.container.len(), 2);
        assert_eq!(fixture.processor.call_count(), 0);
    }

    #[test]
    fn test_min_batch_reached_drains_up_to_max_batch() {
        let fixture = Fixture::new(2, 3, 0, 1000);
        let mut worker = fixture.worker();
        fixture.add(0..5);

        assert_eq!(worker.process_items(false), 1);

        assert_eq!(fixture.processor.batch_items(), vec![vec![0, 1, 2]]);
        assert_eq!(fixture.container.snapshot(), vec![3, 4]);
    }

    #[test]
    fn test_partial_batch_flushed_only_after_max_write_delay() {
        let fixture = Fixture::new(10, 10, 0, 200);
        let mut worker = fixture.worker();
        fixture.add([1, 2]);

        fixture.clock.advance(Duration::from_millis(200));
        assert_eq!(worker.process_items(false), 0, "age must exceed max_write_delay");

        fixture.clock.advance(Duration::from_millis(1));
        assert_eq!(worker.process_items(false), 1);
        assert_eq!(fixture.processor.batch_items(), vec![vec![1, 2]]);
        assert_eq!(worker.last_work_done(), 1_000_201);
    }

    #[test]
    fn test_empty_drain_keeps_last_work_done() {
        let fixture = Fixture::new(10, 10, 0, 200);
        let mut worker = fixture.worker();

        fixture.clock.advance(Duration::from_millis(500));
        assert_eq!(worker.process_items(false), 0);

        assert_eq!(worker.last_processing(), 1_000_500);
        assert_eq!(worker.last_work_done(), 1_000_000);

        // A trickle item arriving after a long idle period is already overdue
        fixture.add([7]);
        assert_eq!(worker.process_items(false), 1);
        assert_eq!(fixture.processor.batch_items(), vec![vec![7]]);
    }

    #[test]
    fn test_clock_stepped_back_delays_flush_by_at_most_max_write_delay() {
        let fixture = Fixture::new(10, 10, 0, 200);
        let mut worker = fixture.worker();
        fixture.add([1, 2]);

        fixture.clock.set(1_000_000 - 3_600_000);
        assert_eq!(worker.process_items(false), 0);
        assert_eq!(worker.last_work_done(), worker.last_processing());

        fixture.clock.advance(Duration::from_millis(201));
        assert_eq!(worker.process_items(false), 1);
        assert_eq!(fixture.processor.batch_items(), vec![vec![1, 2]]);
    }

    #[test]
    fn test_forced_drain_empties_container_in_order() {
        let fixture = Fixture::new(2, 2, 0, 1000);
        let mut worker = fixture.worker();
        fixture.add(0..5);

        assert_eq!(worker.process_items(true), 3);

        assert_eq!(
            fixture.processor.batch_items(),
            vec![vec![0, 1], vec![2, 3], vec![4]]
        );
        assert!(fixture.container.is_empty());
    }

    #[test]
    fn test_forced_drain_on_empty_container() {
        let fixture = Fixture::new(2, 2, 0, 1000);
        let mut worker = fixture.worker();

        assert_eq!(worker.process_items(true), 0);
        assert_eq!(fixture.processor.call_count(), 0);
    }

    #[test]
    fn test_processor_error_does_not_stop_draining() {
        let fixture = Fixture::with_processor(2, 2, 0, 1000, RecordingProcessor::new_fail("sink down"));
        let mut worker = fixture.worker();
        fixture.add(0..4);

        assert_eq!(worker.process_items(true), 2);

        assert_eq!(fixture.processor.call_count(), 2);
        assert!(fixture.container.is_empty(), "failed batches are still consumed");
        let stats = fixture.stats.snapshot();
        assert_eq!(stats.batches_processed, 2);
        assert_eq!(stats.items_processed, 4);
        assert_eq!(stats.batch_failures, 2);
    }

    #[test]
    fn test_processor_panic_is_isolated() {
        let fixture = Fixture::with_processor(
            1,
            1,
            0,
            1000,
            RecordingProcessor::new_panic_inducing("processor exploded"),
        );
        let mut worker = fixture.worker();
        fixture.add([1, 2]);

        assert_eq!(worker.process_items(false), 1);
        assert_eq!(worker.process_items(false), 1);

        assert_eq!(fixture.processor.batch_items(), vec![vec![1], vec![2]]);
        assert_eq!(fixture.stats.snapshot().batch_failures, 2);
    }

    #[test]
    fn test_config_changes_apply_on_next_cycle() {
        let fixture = Fixture::new(5, 10, 0, 1000);
        let mut worker = fixture.worker();
        fixture.add([1, 2]);

        assert_eq!(worker.process_items(false), 0);

        fixture.config.set_min_batch_size(2).unwrap();
        assert_eq!(worker.process_items(false), 1);
        assert_eq!(fixture.processor.batch_items(), vec![vec![1, 2]]);
    }

    #[test]
    fn test_wait_for_more_work_returns_immediately_when_halted() {
        let fixture = Fixture::new(1, 1, 5000, 5000);
        let worker = fixture.worker();
        let (tx, token) = shutdown_channel();
        tx.shutdown();

        let started = Instant::now();
        worker.wait_for_more_work(&token).unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_for_more_work_polls_without_sleep_when_interval_zero() {
        let fixture = Fixture::new(1, 1, 0, 1000);
        fixture.config.set_sleep_interval_when_empty(Duration::ZERO);
        let worker = fixture.worker();
        let (_tx, token) = shutdown_channel();

        let started = Instant::now();
        worker.wait_for_more_work(&token).unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_for_more_work_respects_min_write_delay() {
        let fixture = Fixture::new(1, 1, 50, 1000);
        fixture.add([1]);
        let worker = fixture.worker();
        let (_tx, token) = shutdown_channel();

        let started = Instant::now();
        worker.wait_for_more_work(&token).unwrap();

        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_wait_for_more_work_wakes_when_items_arrive() {
        let fixture = Fixture::new(1, 1, 0, 1000);
        let worker = fixture.worker();
        let (_tx, token) = shutdown_channel();

        let container = fixture.container.clone();
        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            container.offer(1)
        });

        worker.wait_for_more_work(&token).unwrap();

        assert!(producer.join().unwrap());
        assert_eq!(fixture.container.len(), 1);
    }

    #[test]
    fn test_runner_drains_everything_on_shutdown() {
        // min_batch_size is never reached and max_write_delay never passes on
        // the manual clock: only the shutdown pass can flush these items.
        let fixture = Fixture::new(10, 10, 0, 1000);
        fixture.add(0..5);

        let (tx, token) = shutdown_channel();
        let runner = WorkerRunner::new("test-queue", fixture.worker(), token);
        let handle = std::thread::spawn(move || runner.run());

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(fixture.processor.call_count(), 0);

        tx.shutdown();
        handle.join().unwrap();

        assert_eq!(fixture.processor.batch_items(), vec![vec![0, 1, 2, 3, 4]]);
        assert!(fixture.container.is_empty());
    }
}
