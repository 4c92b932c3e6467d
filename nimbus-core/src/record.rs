//! Persisted task records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::state::PublicState;
use crate::status::TaskStatus;

/// Numeric task identifier (newtype pattern for type safety)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        TaskId(id)
    }
}

/// A task as stored by the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub task_type: String,
    pub status: TaskStatus,
    pub public_state: PublicState,
    /// Opaque, type-specific serialized state
    pub private_state: String,
    pub owner_id: Option<i64>,
    pub correlation_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTaskRecord {
    pub task_type: String,
    pub status: TaskStatus,
    pub public_state: PublicState,
    pub private_state: String,
    pub owner_id: Option<i64>,
    pub correlation_id: Uuid,
}

/// Fields rewritten on every persisted transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecordUpdate {
    pub status: TaskStatus,
    pub public_state: PublicState,
    pub private_state: String,
}
