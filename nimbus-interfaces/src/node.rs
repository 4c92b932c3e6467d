//! Node RPC surface used to delegate sub-tasks to cluster nodes

use async_trait::async_trait;
use nimbus_core::{NodeId, Progress, TaskId, TaskSnapshot, TaskStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Kind of work a node advertises it can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCapability {
    CreateArchive,
    ExtractArchive,
    RemoteDownload,
    MediaMeta,
}

impl NodeCapability {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeCapability::CreateArchive => "create_archive",
            NodeCapability::ExtractArchive => "extract_archive",
            NodeCapability::RemoteDownload => "remote_download",
            NodeCapability::MediaMeta => "media_meta",
        }
    }
}

impl fmt::Display for NodeCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node RPC errors
#[derive(Debug, Error)]
pub enum NodeError {
    /// The request never got a well-formed answer
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote task {0} not found")]
    NotFound(TaskId),

    /// The node answered with a non-zero code
    #[error("Node rejected request ({code}): {message}")]
    Rejected { code: i32, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("No node provides capability {0}")]
    NoCapableNode(NodeCapability),

    #[error("Unknown node {0}")]
    UnknownNode(NodeId),
}

impl NodeError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, NodeError::Transport(_) | NodeError::NoCapableNode(_))
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::Protocol(err.to_string())
    }
}

pub type NodeResult<T> = Result<T, NodeError>;

/// Request to create a task on a remote node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub task_type: String,
    /// Serialized private state of the sub-task
    pub state: String,
    pub owner_id: Option<i64>,
    pub correlation_id: Uuid,
    /// Identifier of the requesting master
    #[serde(default)]
    pub origin: Option<String>,
    /// ID of the orchestrating task on the master
    #[serde(default)]
    pub master_task_id: Option<TaskId>,
}

/// What a node reports about one of its tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTaskSnapshot {
    pub status: TaskStatus,
    pub private_state: String,
    #[serde(default)]
    pub progress: Option<Progress>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RemoteTaskSnapshot {
    pub fn from_snapshot(snapshot: TaskSnapshot, include_progress: bool) -> Self {
        Self {
            status: snapshot.status.unwrap_or(TaskStatus::Queued),
            private_state: snapshot.private_state,
            progress: include_progress.then_some(snapshot.progress),
            error: snapshot.public_state.error,
        }
    }
}

/// Response envelope used by the node API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub code: i32,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub msg: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            data: Some(data),
            msg: String::new(),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> Self {
        Self {
            code,
            data: None,
            msg: msg.into(),
        }
    }

    /// Unwrap the payload of a successful response
    pub fn into_result(self) -> NodeResult<T> {
        if self.code != 0 {
            return Err(NodeError::Rejected {
                code: self.code,
                message: self.msg,
            });
        }
        self.data
            .ok_or_else(|| NodeError::Protocol("response carries no data".to_string()))
    }
}

/// Client side of the node RPC surface
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Create a task on the node and return its remote ID
    async fn create_task(&self, request: CreateTaskRequest) -> NodeResult<TaskId>;

    /// Fetch the current state of a remote task
    async fn get_task(&self, id: TaskId, include_progress: bool) -> NodeResult<RemoteTaskSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_success() {
        let response: ApiResponse<TaskId> =
            serde_json::from_value(json!({"code": 0, "data": 17, "msg": ""})).unwrap();
        assert_eq!(response.into_result().unwrap(), TaskId(17));
    }

    #[test]
    fn test_envelope_rejection() {
        let response: ApiResponse<TaskId> =
            serde_json::from_value(json!({"code": 40004, "msg": "unknown task type"})).unwrap();
        let err = response.into_result().unwrap_err();
        assert!(matches!(err, NodeError::Rejected { code: 40004, .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_capability_wire_name() {
        let value = serde_json::to_value(NodeCapability::RemoteDownload).unwrap();
        assert_eq!(value, json!("remote_download"));
        assert_eq!(NodeCapability::MediaMeta.to_string(), "media_meta");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(NodeError::Transport("reset".to_string()).is_retryable());
        assert!(NodeError::NoCapableNode(NodeCapability::CreateArchive).is_retryable());
        assert!(!NodeError::NotFound(TaskId(1)).is_retryable());
        assert!(!NodeError::UnknownNode(4).is_retryable());
    }
}
