//! Core domain types for the Nimbus task engine
//!
//! This crate defines the contract every resumable task implements, the
//! bookkeeping shared by all tasks ([`TaskCore`]), the status machine the
//! queue drives tasks through, and the progress/summary types exposed to
//! external pollers. It has no knowledge of storage, scheduling or the
//! cluster; those live in the crates that depend on it.

pub mod context;
pub mod error;
pub mod progress;
pub mod record;
pub mod state;
pub mod status;
pub mod task;
pub mod transitions;

// Re-export commonly used types at the crate root
pub use context::TaskContext;
pub use error::{BoxError, TaskError, TaskResult};
pub use progress::{Progress, ProgressEntry, Summary};
pub use record::{NewTaskRecord, TaskId, TaskRecord, TaskRecordUpdate};
pub use state::{DelegationProps, NodeId, PublicState};
pub use status::{StatusParseError, TaskStatus};
pub use task::{Task, TaskCore, TaskSnapshot};
pub use transitions::{Transition, TransitionTable};
