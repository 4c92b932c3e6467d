//! The task contract and the bookkeeping shared by every task type
//!
//! Concrete workflows own a [`TaskCore`] and implement [`Task::run`]. The
//! core keeps identity, status, public and private state behind its own lock,
//! so workers and external progress pollers can touch a task concurrently.
//!
//! The usual shape of `run` for a multi-phase workflow is:
//!
//! ```ignore
//! let mut state: MyState = self.core().state()?;
//! match state.phase {
//!     Phase::Prepare => {
//!         prepare(&state).await?;
//!         state.phase = Phase::Poll;
//!         self.core().set_state(&state)?;
//!         Ok(TaskStatus::Suspending) // resume immediately
//!     }
//!     Phase::Poll => {
//!         if !job_finished(&state).await? {
//!             self.core().resume_after(Duration::from_secs(30));
//!             return Ok(TaskStatus::Suspending);
//!         }
//!         Ok(TaskStatus::Completed)
//!     }
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::context::TaskContext;
use crate::error::{TaskError, TaskResult};
use crate::progress::{Progress, Summary};
use crate::record::{NewTaskRecord, TaskId, TaskRecord, TaskRecordUpdate};
use crate::state::{DelegationProps, PublicState};
use crate::status::TaskStatus;

/// A resumable, persistable, retryable unit of work
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Shared bookkeeping owned by the task
    fn core(&self) -> &TaskCore;

    /// Run one iteration (usually one phase) of the task
    ///
    /// Returning [`TaskStatus::Processing`] asks the worker to call `run`
    /// again right away; [`TaskStatus::Suspending`] parks the task until the
    /// delay requested with [`TaskCore::resume_after`] elapses.
    async fn run(&self, ctx: &TaskContext) -> TaskResult<TaskStatus>;

    /// Progress of the task keyed by sub-metric
    fn progress(&self) -> Progress {
        Progress::default()
    }

    /// Summary for external display
    fn summarize(&self) -> Summary {
        Summary::default()
    }

    /// Release resources; called once when the task leaves processing for good
    async fn cleanup(&self, _ctx: &TaskContext) -> TaskResult<()> {
        Ok(())
    }

    /// Whether transitions of this task are written to storage
    fn should_persist(&self) -> bool {
        self.core().is_persistent()
    }

    fn id(&self) -> TaskId {
        self.core().id()
    }

    fn task_type(&self) -> String {
        self.core().task_type()
    }

    fn status(&self) -> Option<TaskStatus> {
        self.core().status()
    }

    /// Point-in-time view for pollers
    fn snapshot(&self) -> TaskSnapshot {
        let core = self.core();
        TaskSnapshot {
            id: core.id(),
            task_type: core.task_type(),
            status: core.status(),
            progress: self.progress(),
            summary: self.summarize(),
            public_state: core.public_state(),
            private_state: core.private_state(),
            owner_id: core.owner_id(),
            correlation_id: core.correlation_id(),
        }
    }
}

/// Read-only view of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub task_type: String,
    pub status: Option<TaskStatus>,
    pub progress: Progress,
    pub summary: Summary,
    pub public_state: PublicState,
    pub private_state: String,
    pub owner_id: Option<i64>,
    pub correlation_id: Uuid,
}

#[derive(Debug)]
struct TaskInner {
    id: TaskId,
    task_type: String,
    status: Option<TaskStatus>,
    owner_id: Option<i64>,
    correlation_id: Uuid,
    public: PublicState,
    private: String,
    requested_resume: Option<Duration>,
    persisted: bool,
    persistent: bool,
}

/// Bookkeeping shared by every task type
#[derive(Debug)]
pub struct TaskCore {
    inner: RwLock<TaskInner>,
}

impl TaskCore {
    /// Create an unsubmitted task of the given type
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(TaskInner {
                id: TaskId::default(),
                task_type: task_type.into(),
                status: None,
                owner_id: None,
                correlation_id: Uuid::new_v4(),
                public: PublicState::default(),
                private: String::new(),
                requested_resume: None,
                persisted: false,
                persistent: true,
            }),
        }
    }

    /// Rebuild the bookkeeping of a stored task
    pub fn from_record(record: &TaskRecord) -> Self {
        Self {
            inner: RwLock::new(TaskInner {
                id: record.id,
                task_type: record.task_type.clone(),
                status: Some(record.status),
                owner_id: record.owner_id,
                correlation_id: record.correlation_id,
                public: record.public_state.clone(),
                private: record.private_state.clone(),
                requested_resume: None,
                persisted: true,
                persistent: true,
            }),
        }
    }

    pub fn with_owner(mut self, owner_id: Option<i64>) -> Self {
        self.inner.get_mut().owner_id = owner_id;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.inner.get_mut().correlation_id = correlation_id;
        self
    }

    pub fn with_private_state(mut self, private: impl Into<String>) -> Self {
        self.inner.get_mut().private = private.into();
        self
    }

    /// Serialize typed business state as the initial private state
    pub fn with_state<T: Serialize>(self, state: &T) -> TaskResult<Self> {
        let private = serde_json::to_string(state)?;
        Ok(self.with_private_state(private))
    }

    /// Keep this task out of storage (delegated sub-tasks, short-lived work)
    pub fn non_persistent(mut self) -> Self {
        self.inner.get_mut().persistent = false;
        self
    }

    pub fn id(&self) -> TaskId {
        self.inner.read().id
    }

    pub fn set_id(&self, id: TaskId) {
        self.inner.write().id = id;
    }

    pub fn task_type(&self) -> String {
        self.inner.read().task_type.clone()
    }

    pub fn status(&self) -> Option<TaskStatus> {
        self.inner.read().status
    }

    pub fn set_status(&self, status: TaskStatus) {
        self.inner.write().status = Some(status);
    }

    /// Put back the status held before an aborted transition
    pub fn restore_status(&self, status: Option<TaskStatus>) {
        self.inner.write().status = status;
    }

    pub fn owner_id(&self) -> Option<i64> {
        self.inner.read().owner_id
    }

    pub fn correlation_id(&self) -> Uuid {
        self.inner.read().correlation_id
    }

    pub fn public_state(&self) -> PublicState {
        self.inner.read().public.clone()
    }

    pub fn private_state(&self) -> String {
        self.inner.read().private.clone()
    }

    pub fn set_private_state(&self, private: impl Into<String>) {
        self.inner.write().private = private.into();
    }

    /// Deserialize the private state into the task's typed state
    pub fn state<T: DeserializeOwned>(&self) -> TaskResult<T> {
        let inner = self.inner.read();
        Ok(serde_json::from_str(&inner.private)?)
    }

    pub fn set_state<T: Serialize>(&self, state: &T) -> TaskResult<()> {
        let private = serde_json::to_string(state)?;
        self.inner.write().private = private;
        Ok(())
    }

    pub fn retried(&self) -> u32 {
        self.inner.read().public.retried
    }

    pub fn executed(&self) -> Duration {
        self.inner.read().public.executed
    }

    pub fn add_executed(&self, elapsed: Duration) {
        self.inner.write().public.executed += elapsed;
    }

    pub fn resume_time(&self) -> Option<DateTime<Utc>> {
        self.inner.read().public.resume_time
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.read().public.error.clone()
    }

    pub fn error_history(&self) -> Vec<String> {
        self.inner.read().public.error_history.clone()
    }

    pub fn delegation(&self) -> Option<DelegationProps> {
        self.inner.read().public.delegation.clone()
    }

    pub fn set_delegation(&self, props: DelegationProps) {
        self.inner.write().public.delegation = Some(props);
    }

    /// Ask to be resumed `delay` after the next suspension
    pub fn resume_after(&self, delay: Duration) {
        self.inner.write().requested_resume = Some(delay);
    }

    /// Consume the requested resume delay; zero means resume immediately
    pub fn take_resume_delay(&self) -> Duration {
        self.inner.write().requested_resume.take().unwrap_or_default()
    }

    /// Record the instant the task is parked until
    pub fn on_suspend(&self, resume_time: DateTime<Utc>) {
        self.inner.write().public.resume_time = Some(resume_time);
    }

    /// Record a failed iteration that will be retried, returning the new retry count
    pub fn on_retry(&self, err: &TaskError) -> u32 {
        let mut inner = self.inner.write();
        inner.public.retried += 1;
        inner.public.error_history.push(err.to_string());
        inner.public.retried
    }

    /// Record the error that ends the task
    pub fn on_error(&self, err: &TaskError) {
        self.inner.write().public.error = Some(err.to_string());
    }

    pub fn is_persistent(&self) -> bool {
        self.inner.read().persistent
    }

    pub fn set_persistent(&self, persistent: bool) {
        self.inner.write().persistent = persistent;
    }

    /// Whether a record for this task already exists in storage
    pub fn is_persisted(&self) -> bool {
        self.inner.read().persisted
    }

    pub fn mark_persisted(&self, id: TaskId) {
        let mut inner = self.inner.write();
        inner.id = id;
        inner.persisted = true;
    }

    /// Fields needed to create the first record; `None` before submission
    pub fn to_new_record(&self) -> Option<NewTaskRecord> {
        let inner = self.inner.read();
        Some(NewTaskRecord {
            task_type: inner.task_type.clone(),
            status: inner.status?,
            public_state: inner.public.clone(),
            private_state: inner.private.clone(),
            owner_id: inner.owner_id,
            correlation_id: inner.correlation_id,
        })
    }

    /// Fields rewritten on a transition; `None` before submission
    pub fn to_update(&self) -> Option<TaskRecordUpdate> {
        let inner = self.inner.read();
        Some(TaskRecordUpdate {
            status: inner.status?,
            public_state: inner.public.clone(),
            private_state: inner.private.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct ArchiveState {
        phase: String,
        files: Vec<String>,
    }

    #[test]
    fn test_typed_state_round_trip() {
        let state = ArchiveState {
            phase: "compress".to_string(),
            files: vec!["a.txt".to_string()],
        };
        let core = TaskCore::new("create_archive").with_state(&state).unwrap();
        assert_eq!(core.state::<ArchiveState>().unwrap(), state);
        assert!(core.status().is_none());
        assert!(core.is_persistent());
        assert!(!core.is_persisted());
    }

    #[test]
    fn test_malformed_state_is_critical() {
        let core = TaskCore::new("create_archive").with_private_state("{broken");
        let err = core.state::<ArchiveState>().unwrap_err();
        assert!(err.is_critical());
    }

    #[test]
    fn test_retry_bookkeeping() {
        let core = TaskCore::new("extract");
        assert_eq!(core.on_retry(&TaskError::retryable("disk busy")), 1);
        assert_eq!(core.on_retry(&TaskError::retryable("disk still busy")), 2);
        core.on_error(&TaskError::retryable("gave up"));

        assert_eq!(core.retried(), 2);
        assert_eq!(core.error_history(), vec!["disk busy", "disk still busy"]);
        assert_eq!(core.last_error().as_deref(), Some("gave up"));
    }

    #[test]
    fn test_resume_delay_is_consumed() {
        let core = TaskCore::new("poll");
        assert_eq!(core.take_resume_delay(), Duration::ZERO);

        core.resume_after(Duration::from_secs(30));
        assert_eq!(core.take_resume_delay(), Duration::from_secs(30));
        assert_eq!(core.take_resume_delay(), Duration::ZERO);
    }

    #[test]
    fn test_from_record() {
        let now = Utc::now();
        let record = TaskRecord {
            id: TaskId(42),
            task_type: "media_meta".to_string(),
            status: TaskStatus::Suspending,
            public_state: PublicState {
                retried: 1,
                resume_time: Some(now),
                ..Default::default()
            },
            private_state: "{}".to_string(),
            owner_id: Some(3),
            correlation_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };

        let core = TaskCore::from_record(&record);
        assert_eq!(core.id(), TaskId(42));
        assert_eq!(core.status(), Some(TaskStatus::Suspending));
        assert_eq!(core.retried(), 1);
        assert_eq!(core.resume_time(), Some(now));
        assert!(core.is_persisted());

        let update = core.to_update().unwrap();
        assert_eq!(update.status, TaskStatus::Suspending);
        assert_eq!(update.public_state.retried, 1);
    }

    #[test]
    fn test_records_require_status() {
        let core = TaskCore::new("thumb").with_owner(Some(1));
        assert!(core.to_new_record().is_none());

        core.set_status(TaskStatus::Queued);
        let record = core.to_new_record().unwrap();
        assert_eq!(record.status, TaskStatus::Queued);
        assert_eq!(record.owner_id, Some(1));
    }
}
