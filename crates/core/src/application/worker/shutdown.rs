// Worker Shutdown Token

use crate::error::{QueueError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

struct HaltState {
    halted: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Shutdown signal for graceful termination.
///
/// The flag goes `false -> true` exactly once and is never reset.
#[derive(Clone)]
pub struct ShutdownToken {
    inner: Arc<HaltState>,
}

impl ShutdownToken {
    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.inner.halted.load(Ordering::Acquire)
    }

    /// Sleep for up to `timeout`, returning as soon as shutdown is signalled.
    ///
    /// Returns immediately if shutdown was already signalled. Spurious
    /// wakeups do not shorten the wait.
    ///
    /// # Errors
    /// `QueueError::Interrupted` if the internal lock is poisoned
    pub fn wait_timeout(&self, timeout: Duration) -> Result<()> {
        let guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| QueueError::Interrupted)?;
        let (_guard, _) = self
            .inner
            .wake
            .wait_timeout_while(guard, timeout, |_| !self.is_shutdown())
            .map_err(|_| QueueError::Interrupted)?;
        Ok(())
    }

    /// Wait for shutdown signal
    pub fn wait(&self) -> Result<()> {
        let guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| QueueError::Interrupted)?;
        let _guard = self
            .inner
            .wake
            .wait_while(guard, |_| !self.is_shutdown())
            .map_err(|_| QueueError::Interrupted)?;
        Ok(())
    }
}

/// Shutdown sender
pub struct ShutdownSender {
    inner: Arc<HaltState>,
}

impl ShutdownSender {
    /// Signal shutdown and wake every sleeping token holder.
    ///
    /// Does not wait for anyone to observe the signal.
    pub fn shutdown(&self) {
        // Flag is set under the lock so a waiter cannot miss the wakeup
        // between checking it and starting to wait.
        let _guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.halted.store(true, Ordering::Release);
        self.inner.wake.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.halted.load(Ordering::Acquire)
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let inner = Arc::new(HaltState {
        halted: AtomicBool::new(false),
        lock: Mutex::new(()),
        wake: Condvar::new(),
    });
    (
        ShutdownSender {
            inner: Arc::clone(&inner),
        },
        ShutdownToken { inner },
    )
}
