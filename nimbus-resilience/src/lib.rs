//! Resilience patterns for Nimbus
//!
//! This crate provides the retry policy the queue applies to failed task
//! iterations, the backoff strategies behind it, and the coordinator that
//! tracks active workers during graceful shutdown.

pub mod backoff;
pub mod retry;
pub mod shutdown;

// Re-export commonly used types
pub use backoff::{BackoffCalculator, BackoffStrategy};
pub use retry::RetryPolicy;
pub use shutdown::{ActiveTaskGuard, ShutdownCoordinator, ShutdownError};
