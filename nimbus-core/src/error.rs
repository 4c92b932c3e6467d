//! Task execution errors

use std::time::Duration;
use thiserror::Error;

/// A boxed error that can be sent across threads
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by task code
pub type TaskResult<T> = std::result::Result<T, TaskError>;

/// Errors produced while running a task
///
/// Only [`TaskError::Retryable`] is ever retried. Wrap a failure with
/// [`TaskError::critical`] to fail the task immediately regardless of its
/// remaining retry budget.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Non-retryable failure: malformed state, business-rule violation, etc.
    #[error("critical error: {0}")]
    Critical(#[source] BoxError),

    /// Transient failure, retried with backoff while budget remains
    #[error(transparent)]
    Retryable(#[from] anyhow::Error),

    /// The task used up its execution-time budget
    #[error("task execution exceeded {0:?}")]
    Timeout(Duration),

    /// The task panicked inside a worker
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Wrap any error in the non-retryable sentinel
    pub fn critical(err: impl Into<BoxError>) -> Self {
        TaskError::Critical(err.into())
    }

    /// Build a retryable error from a message
    pub fn retryable(message: impl std::fmt::Display) -> Self {
        TaskError::Retryable(anyhow::anyhow!("{}", message))
    }

    /// Check if the engine may retry this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Retryable(_))
    }

    /// Check if this error is the non-retryable sentinel
    pub fn is_critical(&self) -> bool {
        matches!(self, TaskError::Critical(_))
    }
}

// Persisted state that no longer parses will not parse on retry either.
impl From<serde_json::Error> for TaskError {
    fn from(err: serde_json::Error) -> Self {
        TaskError::Critical(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(TaskError::retryable("connection reset").is_retryable());
        assert!(TaskError::from(anyhow::anyhow!("busy")).is_retryable());
        assert!(!TaskError::critical("bad input").is_retryable());
        assert!(!TaskError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!TaskError::Panicked("boom".to_string()).is_retryable());
    }

    #[test]
    fn test_malformed_json_is_critical() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let task_err: TaskError = err.into();
        assert!(task_err.is_critical());
        assert!(task_err.to_string().starts_with("critical error"));
    }
}
