//! Builders for task records used as test fixtures

use chrono::{DateTime, Utc};
use nimbus_core::{PublicState, TaskId, TaskRecord, TaskStatus};
use uuid::Uuid;

/// Builder pattern for creating stored task records
pub struct TaskRecordBuilder {
    record: TaskRecord,
}

impl TaskRecordBuilder {
    pub fn new(task_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            record: TaskRecord {
                id: TaskId(1),
                task_type: task_type.into(),
                status: TaskStatus::Queued,
                public_state: PublicState::default(),
                private_state: "{}".to_string(),
                owner_id: None,
                correlation_id: Uuid::new_v4(),
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.record.id = TaskId(id);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.record.status = status;
        self
    }

    pub fn with_private_state(mut self, private_state: impl Into<String>) -> Self {
        self.record.private_state = private_state.into();
        self
    }

    pub fn with_owner(mut self, owner_id: i64) -> Self {
        self.record.owner_id = Some(owner_id);
        self
    }

    pub fn with_retried(mut self, retried: u32) -> Self {
        self.record.public_state.retried = retried;
        self
    }

    pub fn with_resume_time(mut self, resume_time: DateTime<Utc>) -> Self {
        self.record.public_state.resume_time = Some(resume_time);
        self
    }

    pub fn build(self) -> TaskRecord {
        self.record
    }
}
