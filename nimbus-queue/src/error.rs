//! Queue error types

use nimbus_core::{TaskError, TaskStatus};
use nimbus_interfaces::DatabaseError;
use thiserror::Error;

/// Queue engine errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue is shut down")]
    ShutDown,

    #[error("Scheduler capacity of {0} tasks reached")]
    CapacityExceeded(usize),

    #[error("No task ready")]
    NoTaskReady,

    #[error("Invalid transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: TaskStatus },

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] DatabaseError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Queue already started")]
    AlreadyStarted,
}

impl QueueError {
    pub fn invalid_transition(from: Option<TaskStatus>, to: TaskStatus) -> Self {
        QueueError::InvalidTransition {
            from: from.map(|s| s.as_str()).unwrap_or_default().to_string(),
            to,
        }
    }
}

/// Queue result type
pub type QueueResult<T> = Result<T, QueueError>;
