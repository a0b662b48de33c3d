// Worker - generic "run until halted, then one shutdown pass" loop

pub mod constants;
mod panic_guard;
mod shutdown;

pub use panic_guard::{execute_guarded, PanicGuardResult};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::error::{QueueError, Result};
use tracing::{debug, error, info, warn};

/// Work driven by a [`WorkerRunner`] on its own thread
pub trait QueueWorker: Send {
    /// Perform one unit of work.
    ///
    /// Sleeps must go through `shutdown` so that a halt request wakes them.
    /// Returning `QueueError::Interrupted` ends the main loop early.
    fn do_work(&mut self, shutdown: &ShutdownToken) -> Result<()>;

    /// Runs exactly once after the main loop has ended
    fn do_shutdown_work(&mut self) {}
}

/// Drives a [`QueueWorker`] until its shutdown token fires
pub struct WorkerRunner<W> {
    queue_name: String,
    worker: W,
    shutdown: ShutdownToken,
}

impl<W: QueueWorker> WorkerRunner<W> {
    pub fn new(queue_name: impl Into<String>, worker: W, shutdown: ShutdownToken) -> Self {
        Self {
            queue_name: queue_name.into(),
            worker,
            shutdown,
        }
    }

    /// Run worker loop with graceful shutdown support.
    ///
    /// Interruption is not a failure: the loop stops and the shutdown pass
    /// still runs. Returns the worker once everything is done.
    pub fn run(mut self) -> W {
        info!(queue_name = %self.queue_name, "Worker started");

        while !self.shutdown.is_shutdown() {
            match self.worker.do_work(&self.shutdown) {
                Ok(()) => {}
                Err(QueueError::Interrupted) => {
                    warn!(queue_name = %self.queue_name, "Worker interrupted, finishing...");
                    break;
                }
                Err(e) => {
                    error!(queue_name = %self.queue_name, error = %e, "Worker error, finishing...");
                    break;
                }
            }
        }

        debug!(queue_name = %self.queue_name, "Starting shutdown work...");
        self.worker.do_shutdown_work();
        debug!(queue_name = %self.queue_name, "Finished shutdown work");

        info!(queue_name = %self.queue_name, "Worker stopped");
        self.worker
    }
}
