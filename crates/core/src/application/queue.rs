// Batching work queue: config + container + processor + worker thread

use crate::application::batching::BatchingQueueWorker;
use crate::application::lifecycle::{LifecycleQueue, QueueBackend, WorkQueue};
use crate::application::stats::{QueueCounters, QueueStats};
use crate::application::worker::constants::{JOIN_WAIT_INTERVAL, WORKER_THREAD_SUFFIX};
use crate::application::worker::{shutdown_channel, ShutdownSender, ShutdownToken, WorkerRunner};
use crate::domain::{BatchingQueueConfig, QueueState};
use crate::error::{QueueError, Result};
use crate::port::{BatchProcessor, Container, SystemTimeProvider, TimeProvider};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Bounded queue that hands items to a [`BatchProcessor`] in batches.
///
/// One dedicated worker thread per started queue; any number of producers.
/// Batching thresholds are read from the shared [`BatchingQueueConfig`] on
/// every cycle, so changes apply without a restart.
///
/// ```ignore
/// let config = Arc::new(BatchingQueueConfig::new(QueueSettings::default())?);
/// let queue = BatchingWorkQueue::new(config, Arc::new(container), Arc::new(processor));
/// queue.start()?;
/// queue.add(item)?;
/// queue.shutdown();
/// ```
pub struct BatchingWorkQueue<T: Send + 'static> {
    inner: LifecycleQueue<T, BatchingBackend<T>>,
}

impl<T: Send + 'static> BatchingWorkQueue<T> {
    pub fn new(
        config: Arc<BatchingQueueConfig>,
        container: Arc<dyn Container<T>>,
        processor: Arc<dyn BatchProcessor<T>>,
    ) -> Self {
        Self::with_time_provider(config, container, processor, Arc::new(SystemTimeProvider::new()))
    }

    pub fn with_time_provider(
        config: Arc<BatchingQueueConfig>,
        container: Arc<dyn Container<T>>,
        processor: Arc<dyn BatchProcessor<T>>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        let queue_name = config.queue_name().to_string();
        let stats = Arc::new(QueueCounters::default());
        let worker = BatchingQueueWorker::new(
            config.clone(),
            container.clone(),
            processor,
            time_provider,
            stats.clone(),
        );
        let (shutdown_tx, shutdown_rx) = shutdown_channel();

        let backend = BatchingBackend {
            queue_name: queue_name.clone(),
            config,
            container,
            stats,
            shutdown_tx,
            shutdown_rx,
            worker: Mutex::new(Some(worker)),
            worker_thread: Mutex::new(None),
        };
        Self {
            inner: LifecycleQueue::new(queue_name, backend),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn state(&self) -> QueueState {
        self.inner.state()
    }

    /// Live configuration; setters take effect on the next worker cycle
    pub fn config(&self) -> &Arc<BatchingQueueConfig> {
        &self.inner.backend().config
    }

    /// Items currently waiting in the container
    pub fn len(&self) -> usize {
        self.inner.backend().container.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.backend().container.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        self.inner.backend().stats.snapshot()
    }
}

impl<T: Send + 'static> WorkQueue<T> for BatchingWorkQueue<T> {
    fn add(&self, item: T) -> Result<bool> {
        self.inner.add(item)
    }

    fn add_timeout(&self, item: T, timeout: Duration) -> Result<bool> {
        self.inner.add_timeout(item, timeout)
    }

    fn remaining_capacity(&self) -> usize {
        self.inner.remaining_capacity()
    }

    fn start(&self) -> Result<()> {
        self.inner.start()
    }

    fn shutdown(&self) {
        self.inner.shutdown()
    }
}

struct WorkerThread {
    name: String,
    handle: JoinHandle<()>,
    exited: ShutdownToken,
}

/// Fires the exit latch when the worker thread ends, panic or not
struct ExitGuard(ShutdownSender);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

struct BatchingBackend<T> {
    queue_name: String,
    config: Arc<BatchingQueueConfig>,
    container: Arc<dyn Container<T>>,
    stats: Arc<QueueCounters>,
    shutdown_tx: ShutdownSender,
    shutdown_rx: ShutdownToken,
    worker: Mutex<Option<BatchingQueueWorker<T>>>,
    worker_thread: Mutex<Option<WorkerThread>>,
}

impl<T: Send + 'static> BatchingBackend<T> {
    fn wait_for_worker(&self, worker_thread: WorkerThread) {
        while !worker_thread.exited.is_shutdown() {
            debug!(
                queue_name = %self.queue_name,
                thread_name = %worker_thread.name,
                "Waiting for queue worker thread to finish"
            );
            if let Err(e) = worker_thread.exited.wait_timeout(JOIN_WAIT_INTERVAL) {
                warn!(queue_name = %self.queue_name, error = %e, "Stopped waiting for queue worker thread");
                return;
            }
        }

        if worker_thread.handle.join().is_err() {
            error!(
                queue_name = %self.queue_name,
                thread_name = %worker_thread.name,
                "Queue worker thread panicked"
            );
            return;
        }
        debug!(
            queue_name = %self.queue_name,
            thread_name = %worker_thread.name,
            "Queue worker thread finished"
        );
    }
}

impl<T: Send + 'static> QueueBackend<T> for BatchingBackend<T> {
    fn add_to_queue(&self, item: T) -> Result<bool> {
        let accepted = self.container.offer(item);
        self.stats.record_offer(accepted);
        Ok(accepted)
    }

    fn add_to_queue_timeout(&self, item: T, timeout: Duration) -> Result<bool> {
        let accepted = self.container.offer_timeout(item, timeout)?;
        self.stats.record_offer(accepted);
        Ok(accepted)
    }

    fn queue_remaining_capacity(&self) -> usize {
        self.container.remaining_capacity()
    }

    fn on_starting(&self) -> Result<()> {
        let mut worker_slot = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        let worker = worker_slot.take().ok_or_else(|| {
            QueueError::Internal(format!(
                "worker of queue '{}' is no longer available",
                self.queue_name
            ))
        })?;

        let thread_name = format!("{}{}", self.queue_name, WORKER_THREAD_SUFFIX);
        let runner = WorkerRunner::new(self.queue_name.clone(), worker, self.shutdown_rx.clone());
        let (exit_tx, exited) = shutdown_channel();

        let handle = thread::Builder::new().name(thread_name.clone()).spawn(move || {
            let _exit = ExitGuard(exit_tx);
            runner.run();
        })?;

        info!(queue_name = %self.queue_name, thread_name = %thread_name, "Queue worker thread spawned");
        *self
            .worker_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(WorkerThread {
            name: thread_name,
            handle,
            exited,
        });
        Ok(())
    }

    fn on_shutting_down(&self) {
        self.shutdown_tx.shutdown();

        let worker_thread = self
            .worker_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(worker_thread) = worker_thread else {
            let remaining = self.container.len();
            if remaining > 0 {
                warn!(
                    queue_name = %self.queue_name,
                    remaining,
                    "Queue shut down before it was started, items were not processed"
                );
            }
            return;
        };

        if self.config.wait_for_completion_on_shutdown() {
            self.wait_for_worker(worker_thread);
        } else {
            debug!(
                queue_name = %self.queue_name,
                thread_name = %worker_thread.name,
                "Not waiting for queue worker thread"
            );
        }
    }
}

impl<T> Drop for BatchingBackend<T> {
    fn drop(&mut self) {
        self.shutdown_tx.shutdown();
    }
}
