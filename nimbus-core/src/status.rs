//! Task status enumeration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a task
///
/// A task that has been constructed but never submitted has no status at all
/// (`Option<TaskStatus>::None`); the queue moves it to [`TaskStatus::Queued`]
/// on submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the scheduler for a free worker
    Queued,
    /// Currently held by a worker
    Processing,
    /// Parked until its resume time, either for backoff or between phases
    Suspending,
    /// Finished with an unrecoverable error
    Error,
    /// Finished because it was canceled
    Canceled,
    /// Finished successfully
    Completed,
}

impl TaskStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Queued,
        TaskStatus::Processing,
        TaskStatus::Suspending,
        TaskStatus::Error,
        TaskStatus::Canceled,
        TaskStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Suspending => "suspending",
            TaskStatus::Error => "error",
            TaskStatus::Canceled => "canceled",
            TaskStatus::Completed => "completed",
        }
    }

    /// Whether the task will never run again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Error | TaskStatus::Canceled | TaskStatus::Completed
        )
    }

    /// Whether a persisted record with this status should be picked up on restart
    pub fn is_resumable(&self) -> bool {
        matches!(self, TaskStatus::Queued | TaskStatus::Suspending)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing a status from its string form
#[derive(Debug, thiserror::Error)]
#[error("Invalid task status: '{0}'")]
pub struct StatusParseError(String);

impl FromStr for TaskStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskStatus::Queued),
            "processing" => Ok(TaskStatus::Processing),
            "suspending" => Ok(TaskStatus::Suspending),
            "error" => Ok(TaskStatus::Error),
            "canceled" => Ok(TaskStatus::Canceled),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}
