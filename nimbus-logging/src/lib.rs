//! Logging setup for Nimbus
//!
//! Everything in the workspace logs through `tracing`. This crate installs the
//! global subscriber and builds the per-task span that carries correlation
//! fields into every event a task emits.

pub mod init;
pub mod span;

pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing};
pub use span::task_span;
