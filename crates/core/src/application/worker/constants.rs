// Worker constants (No magic values)
use std::time::Duration;

/// Slice length when waiting for the worker thread to finish on shutdown.
/// Each slice that passes without the worker exiting is logged.
pub const JOIN_WAIT_INTERVAL: Duration = Duration::from_secs(1);

/// Worker thread name is `{queue_name}{WORKER_THREAD_SUFFIX}`
pub const WORKER_THREAD_SUFFIX: &str = "-worker";
