//! Live task registry
//!
//! Keeps tasks that are queued or running so callers can read their progress
//! and status without touching storage. Tasks that never reach storage take
//! their IDs from here.

use nimbus_core::{Task, TaskId, TaskSnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, Arc<dyn Task>>>,
    last_id: AtomicI64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an ID for a task that is not persisted
    pub fn next_id(&self) -> TaskId {
        TaskId(self.last_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn set(&self, task: Arc<dyn Task>) {
        self.tasks.write().insert(task.id(), task);
    }

    pub fn get(&self, id: TaskId) -> Option<Arc<dyn Task>> {
        self.tasks.read().get(&id).cloned()
    }

    pub fn delete(&self, id: TaskId) -> Option<Arc<dyn Task>> {
        self.tasks.write().remove(&id)
    }

    pub fn snapshot(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.get(id).map(|task| task.snapshot())
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry").field("tasks", &self.len()).finish()
    }
}
