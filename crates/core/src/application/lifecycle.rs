// Lifecycle gate shared by every work queue flavour

use crate::domain::{AtomicQueueState, QueueState};
use crate::error::{QueueError, Result};
use std::marker::PhantomData;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{error, info};

/// Producer-facing API of a work queue
pub trait WorkQueue<T>: Send + Sync {
    /// Add `item` without blocking.
    ///
    /// Returns `Ok(false)` if the container is full. Permitted before
    /// `start()`: items wait for the worker.
    ///
    /// # Errors
    /// - `QueueError::IllegalState` once `shutdown()` has been called
    fn add(&self, item: T) -> Result<bool>;

    /// Add `item`, waiting up to `timeout` for free capacity.
    ///
    /// # Errors
    /// - `QueueError::IllegalState` once `shutdown()` has been called
    /// - `QueueError::Interrupted` if the wait was cut short
    fn add_timeout(&self, item: T, timeout: Duration) -> Result<bool>;

    /// Free slots in the container, or `UNBOUNDED_CAPACITY`
    fn remaining_capacity(&self) -> usize;

    /// Launch the worker. No-op if already started.
    ///
    /// # Errors
    /// - `QueueError::IllegalState` after `shutdown()`
    /// - whatever launching the worker failed with (state stays `Created`)
    fn start(&self) -> Result<()>;

    /// Stop the worker. Idempotent.
    fn shutdown(&self);
}

/// Hooks a concrete queue plugs into [`LifecycleQueue`]
pub trait QueueBackend<T>: Send + Sync {
    fn add_to_queue(&self, item: T) -> Result<bool>;

    fn add_to_queue_timeout(&self, item: T, timeout: Duration) -> Result<bool>;

    fn queue_remaining_capacity(&self) -> usize;

    /// Launch the worker. Runs at most once per successful start.
    fn on_starting(&self) -> Result<()>;

    /// Signal the worker to stop and optionally wait for it. Runs once.
    fn on_shutting_down(&self);
}

/// State machine guarding a [`QueueBackend`].
///
/// `start()` and `shutdown()` are serialized by one mutex; `add` only reads
/// the atomic state and never takes it.
pub struct LifecycleQueue<T, B> {
    queue_name: String,
    state: AtomicQueueState,
    transition_lock: Mutex<()>,
    backend: B,
    _item: PhantomData<fn(T)>,
}

impl<T, B: QueueBackend<T>> LifecycleQueue<T, B> {
    pub fn new(queue_name: impl Into<String>, backend: B) -> Self {
        Self {
            queue_name: queue_name.into(),
            state: AtomicQueueState::new(QueueState::Created),
            transition_lock: Mutex::new(()),
            backend,
            _item: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.queue_name
    }

    pub fn state(&self) -> QueueState {
        self.state.load()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn validate_add(&self) -> Result<()> {
        match self.state.load() {
            QueueState::ShuttingDown => Err(QueueError::IllegalState(format!(
                "work queue '{}' is shutting down",
                self.queue_name
            ))),
            QueueState::Shutdown => Err(QueueError::IllegalState(format!(
                "work queue '{}' has been shut down",
                self.queue_name
            ))),
            QueueState::Created | QueueState::Started => Ok(()),
        }
    }
}

impl<T, B: QueueBackend<T>> WorkQueue<T> for LifecycleQueue<T, B> {
    fn add(&self, item: T) -> Result<bool> {
        self.validate_add()?;
        self.backend.add_to_queue(item)
    }

    fn add_timeout(&self, item: T, timeout: Duration) -> Result<bool> {
        self.validate_add()?;
        self.backend.add_to_queue_timeout(item, timeout)
    }

    fn remaining_capacity(&self) -> usize {
        self.backend.queue_remaining_capacity()
    }

    fn start(&self) -> Result<()> {
        let _guard = self
            .transition_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match self.state.load() {
            QueueState::Started => return Ok(()),
            state if state.is_terminating() => {
                return Err(QueueError::IllegalState(format!(
                    "work queue '{}' cannot be started after shutdown() has been called",
                    self.queue_name
                )));
            }
            _ => {}
        }

        self.backend.on_starting()?;
        self.state.transition(QueueState::Started)?;
        info!(queue_name = %self.queue_name, "Work queue started");
        Ok(())
    }

    fn shutdown(&self) {
        let _guard = self
            .transition_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.state.load().is_terminating() {
            return;
        }

        if let Err(e) = self.state.transition(QueueState::ShuttingDown) {
            error!(queue_name = %self.queue_name, error = %e, "Failed to begin shutdown");
            return;
        }
        info!(queue_name = %self.queue_name, "Work queue shutting down");

        self.backend.on_shutting_down();

        if let Err(e) = self.state.transition(QueueState::Shutdown) {
            error!(queue_name = %self.queue_name, error = %e, "Failed to complete shutdown");
            return;
        }
        info!(queue_name = %self.queue_name, "Work queue shut down");
    }
}
