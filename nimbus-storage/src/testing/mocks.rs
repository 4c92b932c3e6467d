//! Mock repository implementations using mockall

use async_trait::async_trait;
use mockall::mock;
use nimbus_core::{NewTaskRecord, TaskId, TaskRecord, TaskRecordUpdate};
use nimbus_interfaces::{DatabaseError, DatabaseResult, Repository, TaskRepository};

mock! {
    pub TaskRepo {}

    #[async_trait]
    impl Repository for TaskRepo {
        async fn health_check(&self) -> DatabaseResult<()>;
    }

    #[async_trait]
    impl TaskRepository for TaskRepo {
        async fn create(&self, record: NewTaskRecord) -> DatabaseResult<TaskRecord>;
        async fn update(&self, id: TaskId, update: TaskRecordUpdate) -> DatabaseResult<TaskRecord>;
        async fn find_pending(&self, task_types: &[String]) -> DatabaseResult<Vec<TaskRecord>>;
        async fn find_by_id(&self, id: TaskId) -> DatabaseResult<Option<TaskRecord>>;
    }
}

/// Canned errors for failure injection
pub mod mock_errors {
    use super::DatabaseError;

    pub fn connection_refused() -> DatabaseError {
        DatabaseError::Connection {
            message: "connection refused".to_string(),
        }
    }

    pub fn internal(message: &str) -> DatabaseError {
        DatabaseError::Internal {
            message: message.to_string(),
        }
    }
}
