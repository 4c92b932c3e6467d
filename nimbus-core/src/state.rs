//! Public bookkeeping state shared by every task type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::record::TaskId;

/// Identifier of a cluster node
pub type NodeId = i32;

/// Engine-owned state persisted alongside a task's private state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicState {
    /// Number of failed iterations that were retried
    pub retried: u32,

    /// Total time spent inside `run` across all iterations
    #[serde(with = "humantime_serde")]
    pub executed: Duration,

    /// The error that ended the task, if it failed
    pub error: Option<String>,

    /// Errors of iterations that were retried, oldest first
    pub error_history: Vec<String>,

    /// The task must not run again before this instant
    pub resume_time: Option<DateTime<Utc>>,

    /// Set on tasks created on behalf of another node
    pub delegation: Option<DelegationProps>,
}

/// Where a delegated task came from and where it runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationProps {
    /// Identifier of the master that requested the task
    pub origin: Option<String>,
    /// Node executing the task
    pub node_id: NodeId,
    /// ID of the task on the master, when known
    pub remote_task_id: Option<TaskId>,
}
