// Batching Queue Configuration

use crate::domain::error::{DomainError, Result};
use crate::domain::queue::QueueId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Maximum queue name length (the name is reused as the worker thread name)
pub const MAX_QUEUE_NAME_LEN: usize = 64;

/// Plain description of a queue configuration (deserializable from config
/// files and environment variables). Validated into [`BatchingQueueConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub queue_name: String,
    pub min_batch_size: usize,
    pub max_batch_size: usize,
    pub min_write_delay_ms: u64,
    pub max_write_delay_ms: u64,
    pub sleep_interval_when_empty_ms: u64,
    pub wait_for_completion_on_shutdown: bool,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            queue_name: "default".to_string(),
            min_batch_size: 1,
            max_batch_size: 100,
            min_write_delay_ms: 0,
            max_write_delay_ms: 1000,
            sleep_interval_when_empty_ms: 10,
            wait_for_completion_on_shutdown: true,
        }
    }
}

/// Thread-safe, individually mutable configuration of a batching queue.
///
/// Every getter is a lock-free atomic load, so the worker can re-read the
/// values on each cycle. Setters validate against the related field and are
/// serialized among themselves, so `min_batch_size <= max_batch_size` and
/// `min_write_delay <= max_write_delay` hold after every successful call.
/// A rejected setter leaves the previous value in place.
///
/// Two related fields updated "together" are still two independent writes:
/// a reader may observe the new value of one and the old value of the other.
#[derive(Debug)]
pub struct BatchingQueueConfig {
    queue_name: QueueId,
    min_batch_size: AtomicUsize,
    max_batch_size: AtomicUsize,
    min_write_delay_ms: AtomicU64,
    max_write_delay_ms: AtomicU64,
    sleep_interval_when_empty_ms: AtomicU64,
    wait_for_completion_on_shutdown: AtomicBool,
    write_lock: Mutex<()>,
}

impl BatchingQueueConfig {
    /// Validate `settings` and build a configuration
    ///
    /// # Errors
    /// `DomainError::InvalidArgument` if the name is malformed or any
    /// numeric constraint is violated.
    pub fn new(settings: QueueSettings) -> Result<Self> {
        validate_queue_name(&settings.queue_name)?;

        let config = Self {
            queue_name: settings.queue_name,
            min_batch_size: AtomicUsize::new(0),
            max_batch_size: AtomicUsize::new(0),
            min_write_delay_ms: AtomicU64::new(0),
            max_write_delay_ms: AtomicU64::new(0),
            sleep_interval_when_empty_ms: AtomicU64::new(0),
            wait_for_completion_on_shutdown: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        };

        // Upper bounds first so that any valid (min, max) pair is accepted
        config.set_max_batch_size(settings.max_batch_size)?;
        config.set_min_batch_size(settings.min_batch_size)?;
        config.set_max_write_delay(Duration::from_millis(settings.max_write_delay_ms))?;
        config.set_min_write_delay(Duration::from_millis(settings.min_write_delay_ms))?;
        config.set_sleep_interval_when_empty(Duration::from_millis(
            settings.sleep_interval_when_empty_ms,
        ));
        config.set_wait_for_completion_on_shutdown(settings.wait_for_completion_on_shutdown);

        Ok(config)
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Minimum number of items that triggers an immediate flush
    pub fn min_batch_size(&self) -> usize {
        self.min_batch_size.load(Ordering::Relaxed)
    }

    /// Maximum number of items handed to one processor call
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size.load(Ordering::Relaxed)
    }

    /// Pause between worker cycles
    pub fn min_write_delay(&self) -> Duration {
        Duration::from_millis(self.min_write_delay_ms.load(Ordering::Relaxed))
    }

    /// Age after which a partial batch is flushed anyway
    pub fn max_write_delay(&self) -> Duration {
        Duration::from_millis(self.max_write_delay_ms.load(Ordering::Relaxed))
    }

    /// Idle sleep step while the container is empty
    pub fn sleep_interval_when_empty(&self) -> Duration {
        Duration::from_millis(self.sleep_interval_when_empty_ms.load(Ordering::Relaxed))
    }

    pub fn wait_for_completion_on_shutdown(&self) -> bool {
        self.wait_for_completion_on_shutdown.load(Ordering::Relaxed)
    }

    pub fn set_min_batch_size(&self, min_batch_size: usize) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        check_argument(min_batch_size >= 1, "min_batch_size must be >= 1")?;
        check_argument(
            min_batch_size <= self.max_batch_size(),
            "min_batch_size must be <= max_batch_size",
        )?;
        self.min_batch_size.store(min_batch_size, Ordering::Relaxed);
        Ok(())
    }

    pub fn set_max_batch_size(&self, max_batch_size: usize) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        check_argument(max_batch_size >= 1, "max_batch_size must be >= 1")?;
        check_argument(
            max_batch_size >= self.min_batch_size(),
            "max_batch_size must be >= min_batch_size",
        )?;
        self.max_batch_size.store(max_batch_size, Ordering::Relaxed);
        Ok(())
    }

    pub fn set_min_write_delay(&self, min_write_delay: Duration) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let millis = duration_millis(min_write_delay);
        check_argument(
            millis <= self.max_write_delay_ms.load(Ordering::Relaxed),
            "min_write_delay must be <= max_write_delay",
        )?;
        self.min_write_delay_ms.store(millis, Ordering::Relaxed);
        Ok(())
    }

    pub fn set_max_write_delay(&self, max_write_delay: Duration) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let millis = duration_millis(max_write_delay);
        check_argument(
            millis >= self.min_write_delay_ms.load(Ordering::Relaxed),
            "max_write_delay must be >= min_write_delay",
        )?;
        self.max_write_delay_ms.store(millis, Ordering::Relaxed);
        Ok(())
    }

    pub fn set_sleep_interval_when_empty(&self, interval: Duration) {
        self.sleep_interval_when_empty_ms
            .store(duration_millis(interval), Ordering::Relaxed);
    }

    pub fn set_wait_for_completion_on_shutdown(&self, wait: bool) {
        self.wait_for_completion_on_shutdown
            .store(wait, Ordering::Relaxed);
    }

    /// Snapshot of the current values
    pub fn settings(&self) -> QueueSettings {
        QueueSettings {
            queue_name: self.queue_name.clone(),
            min_batch_size: self.min_batch_size(),
            max_batch_size: self.max_batch_size(),
            min_write_delay_ms: self.min_write_delay_ms.load(Ordering::Relaxed),
            max_write_delay_ms: self.max_write_delay_ms.load(Ordering::Relaxed),
            sleep_interval_when_empty_ms: self.sleep_interval_when_empty_ms.load(Ordering::Relaxed),
            wait_for_completion_on_shutdown: self.wait_for_completion_on_shutdown(),
        }
    }
}

impl TryFrom<QueueSettings> for BatchingQueueConfig {
    type Error = DomainError;

    fn try_from(settings: QueueSettings) -> Result<Self> {
        Self::new(settings)
    }
}

/// Queue names must be non-empty, short, and made of `[A-Za-z0-9._-]`
pub fn validate_queue_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DomainError::InvalidArgument(
            "queue_name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_QUEUE_NAME_LEN {
        return Err(DomainError::InvalidArgument(format!(
            "queue_name too long: {} chars (max {})",
            name.len(),
            MAX_QUEUE_NAME_LEN
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(DomainError::InvalidArgument(format!(
            "queue_name must be alphanumeric (plus '-', '_', '.'): {name}"
        )));
    }
    Ok(())
}

fn check_argument(expression: bool, message: &str) -> Result<()> {
    if expression {
        Ok(())
    } else {
        Err(DomainError::InvalidArgument(message.to_string()))
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
