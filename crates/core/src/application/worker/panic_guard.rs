// Panic isolation for worker safety
use std::any::Any;
use std::panic::{catch_unwind, UnwindSafe};

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed (possibly with an `Err` of its own)
    Success(T),
    /// Execution panicked; carries the panic message
    Panicked(String),
}

/// Execute a closure with panic isolation
///
/// A panicking batch processor must not take the worker thread down with it:
/// the panic is caught and returned as `PanicGuardResult::Panicked`. Logging
/// is left to the caller, which knows the queue context.
///
/// Has no effect when the binary is built with `panic = "abort"`.
pub fn execute_guarded<F, T>(f: F) -> PanicGuardResult<T>
where
    F: FnOnce() -> T + UnwindSafe,
{
    match catch_unwind(f) {
        Ok(result) => PanicGuardResult::Success(result),
        Err(payload) => PanicGuardResult::Panicked(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
