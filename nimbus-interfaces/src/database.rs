//! Persistence interfaces
//!
//! The engine only needs to create a record the first time a task is
//! submitted, rewrite it on later transitions, and list records that were
//! left pending when a process stopped.

use async_trait::async_trait;
use nimbus_core::{NewTaskRecord, TaskId, TaskRecord, TaskRecordUpdate};

/// Common database error type
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Constraint violation: {message}")]
    Constraint { message: String },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Internal database error: {message}")]
    Internal { message: String },
}

impl DatabaseError {
    pub fn task_not_found(id: TaskId) -> Self {
        DatabaseError::NotFound {
            entity: "task".to_string(),
            id: id.to_string(),
        }
    }

    /// Connection failures may succeed when tried again
    pub fn is_transient(&self) -> bool {
        matches!(self, DatabaseError::Connection { .. })
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Base repository trait with health check capability
#[async_trait]
pub trait Repository: Send + Sync {
    /// Check if the repository is healthy and can serve requests
    async fn health_check(&self) -> DatabaseResult<()>;
}

/// Storage of task records
#[async_trait]
pub trait TaskRepository: Repository {
    /// Insert a new record; the store assigns the ID
    async fn create(&self, record: NewTaskRecord) -> DatabaseResult<TaskRecord>;

    /// Rewrite status and state of an existing record
    async fn update(&self, id: TaskId, update: TaskRecordUpdate) -> DatabaseResult<TaskRecord>;

    /// Records in `queued` or `suspending` status whose type is listed
    async fn find_pending(&self, task_types: &[String]) -> DatabaseResult<Vec<TaskRecord>>;

    async fn find_by_id(&self, id: TaskId) -> DatabaseResult<Option<TaskRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DatabaseError::task_not_found(TaskId(9));
        assert_eq!(err.to_string(), "Entity not found: task with id 9");
        assert!(!err.is_transient());

        let err = DatabaseError::Connection {
            message: "refused".to_string(),
        };
        assert!(err.is_transient());
    }
}
