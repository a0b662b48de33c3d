// Port Layer - Interfaces for external collaborators

pub mod batch_processor;
pub mod container;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use batch_processor::{BatchProcessor, ProcessError};
pub use container::{Container, UNBOUNDED_CAPACITY};
pub use time_provider::{SystemTimeProvider, TimeProvider};
