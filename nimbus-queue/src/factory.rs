//! Task-type factories used to rebuild tasks from stored records

use nimbus_core::{Task, TaskCore, TaskRecord, TaskResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{QueueError, QueueResult};

/// Builds a concrete task around prepared bookkeeping
pub type TaskFactory = Arc<dyn Fn(TaskCore) -> TaskResult<Arc<dyn Task>> + Send + Sync>;

/// Mapping from task type name to factory
///
/// Each workflow module registers its own types; the queue consults the
/// registry when it reloads pending records on start.
#[derive(Clone, Default)]
pub struct TaskTypeRegistry {
    factories: HashMap<String, TaskFactory>,
}

impl TaskTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any previous one for the same type
    pub fn register<F>(&mut self, task_type: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(TaskCore) -> TaskResult<Arc<dyn Task>> + Send + Sync + 'static,
    {
        self.factories.insert(task_type.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.factories.contains_key(task_type)
    }

    pub fn task_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Rebuild a task from its stored record
    pub fn build(&self, record: &TaskRecord) -> QueueResult<Arc<dyn Task>> {
        self.build_with_core(TaskCore::from_record(record))
    }

    /// Build a task of the core's type around the given bookkeeping
    pub fn build_with_core(&self, core: TaskCore) -> QueueResult<Arc<dyn Task>> {
        let task_type = core.task_type();
        let factory = self
            .factories
            .get(&task_type)
            .ok_or_else(|| QueueError::UnknownTaskType(task_type.clone()))?;
        Ok(factory(core)?)
    }
}

impl fmt::Debug for TaskTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskTypeRegistry")
            .field("task_types", &self.task_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedTask, Step};
    use nimbus_core::{TaskError, TaskStatus};
    use nimbus_storage::testing::TaskRecordBuilder;

    fn registry() -> TaskTypeRegistry {
        let mut registry = TaskTypeRegistry::new();
        registry
            .register("scripted", |core| {
                let task = ScriptedTask::with_core(core, [Step::Return(TaskStatus::Completed)]);
                Ok(task as Arc<dyn Task>)
            })
            .register("strict", |core| {
                let _: serde_json::Value = core.state()?;
                Err(TaskError::critical("never built"))
            });
        registry
    }

    #[test]
    fn test_build_from_record() {
        let record = TaskRecordBuilder::new("scripted")
            .with_id(7)
            .with_status(TaskStatus::Suspending)
            .with_retried(2)
            .build();

        let task = registry().build(&record).unwrap();
        assert_eq!(task.id().as_i64(), 7);
        assert_eq!(task.status(), Some(TaskStatus::Suspending));
        assert_eq!(task.core().retried(), 2);
        assert!(task.core().is_persisted());
    }

    #[test]
    fn test_unknown_type() {
        let record = TaskRecordBuilder::new("thumb").build();
        let err = registry().build(&record).err().expect("build should fail");
        assert!(matches!(err, QueueError::UnknownTaskType(t) if t == "thumb"));
    }

    #[test]
    fn test_factory_errors_propagate() {
        let record = TaskRecordBuilder::new("strict").with_private_state("{oops").build();
        let err = registry().build(&record).err().expect("build should fail");
        assert!(matches!(err, QueueError::Task(e) if e.is_critical()));
    }

    #[test]
    fn test_task_types_sorted() {
        assert_eq!(registry().task_types(), vec!["scripted", "strict"]);
    }
}
