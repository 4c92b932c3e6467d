use async_trait::async_trait;
use chrono::Utc;
use nimbus_core::{NewTaskRecord, TaskId, TaskRecord, TaskRecordUpdate, TaskStatus};
use nimbus_interfaces::{DatabaseError, DatabaseResult, Repository, TaskRepository};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Default)]
struct Tables {
    records: BTreeMap<TaskId, TaskRecord>,
    /// Every status written per task, in write order
    writes: BTreeMap<TaskId, Vec<TaskStatus>>,
    last_id: i64,
}

/// Task repository kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    tables: RwLock<Tables>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record as-is, keeping its ID (used to stage a cold start)
    pub fn insert(&self, record: TaskRecord) {
        let mut tables = self.tables.write();
        tables.last_id = tables.last_id.max(record.id.as_i64());
        tables.writes.entry(record.id).or_default().push(record.status);
        tables.records.insert(record.id, record);
    }

    pub fn get(&self, id: TaskId) -> Option<TaskRecord> {
        self.tables.read().records.get(&id).cloned()
    }

    pub fn records(&self) -> Vec<TaskRecord> {
        self.tables.read().records.values().cloned().collect()
    }

    /// Statuses written for a task, oldest first
    pub fn status_writes(&self, id: TaskId) -> Vec<TaskStatus> {
        self.tables.read().writes.get(&id).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.tables.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Repository for InMemoryTaskRepository {
    async fn health_check(&self) -> DatabaseResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, record: NewTaskRecord) -> DatabaseResult<TaskRecord> {
        if record.task_type.is_empty() {
            return Err(DatabaseError::Validation {
                message: "task_type cannot be empty".to_string(),
            });
        }

        let mut tables = self.tables.write();
        tables.last_id += 1;
        let id = TaskId(tables.last_id);
        let now = Utc::now();
        let stored = TaskRecord {
            id,
            task_type: record.task_type,
            status: record.status,
            public_state: record.public_state,
            private_state: record.private_state,
            owner_id: record.owner_id,
            correlation_id: record.correlation_id,
            created_at: now,
            updated_at: now,
        };

        debug!(task_id = %id, task_type = %stored.task_type, "Created task record");
        tables.writes.entry(id).or_default().push(stored.status);
        tables.records.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: TaskId, update: TaskRecordUpdate) -> DatabaseResult<TaskRecord> {
        let mut tables = self.tables.write();
        let record = tables
            .records
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::task_not_found(id))?;

        record.status = update.status;
        record.public_state = update.public_state;
        record.private_state = update.private_state;
        record.updated_at = Utc::now();
        let stored = record.clone();

        tables.writes.entry(id).or_default().push(stored.status);
        Ok(stored)
    }

    async fn find_pending(&self, task_types: &[String]) -> DatabaseResult<Vec<TaskRecord>> {
        let tables = self.tables.read();
        Ok(tables
            .records
            .values()
            .filter(|r| matches!(r.status, TaskStatus::Queued | TaskStatus::Suspending))
            .filter(|r| task_types.iter().any(|t| t == &r.task_type))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: TaskId) -> DatabaseResult<Option<TaskRecord>> {
        Ok(self.get(id))
    }
}
