//! Master-side workflow that runs a sub-task on a cluster node

use async_trait::async_trait;
use nimbus_core::{
    NodeId, Progress, Summary, Task, TaskContext, TaskCore, TaskError, TaskId, TaskResult,
    TaskStatus,
};
use nimbus_interfaces::{CreateTaskRequest, NodeCapability, NodeError};
use nimbus_queue::TaskTypeRegistry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::pool::NodePool;

pub const DELEGATED_TASK_TYPE: &str = "delegated";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationPhase {
    /// Allocate a node and create the remote task
    #[default]
    Submit,
    /// Poll the remote task
    Monitor,
    /// The remote task completed
    Finished,
}

impl DelegationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DelegationPhase::Submit => "submit",
            DelegationPhase::Monitor => "monitor",
            DelegationPhase::Finished => "finished",
        }
    }
}

/// Private state of a [`DelegatedTask`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegatedState {
    #[serde(default)]
    pub phase: DelegationPhase,
    pub capability: NodeCapability,
    /// Task type created on the node
    pub remote_type: String,
    /// Serialized state of the remote task
    pub payload: String,
    #[serde(default)]
    pub node_id: Option<NodeId>,
    #[serde(default)]
    pub remote_task_id: Option<TaskId>,
    /// Private state last reported by the node
    #[serde(default)]
    pub remote_state: Option<String>,
}

impl DelegatedState {
    pub fn new(
        capability: NodeCapability,
        remote_type: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            phase: DelegationPhase::Submit,
            capability,
            remote_type: remote_type.into(),
            payload: payload.into(),
            node_id: None,
            remote_task_id: None,
            remote_state: None,
        }
    }
}

/// Creates a task on a capable node and follows it to the end
///
/// The remote task's progress is merged into this task's progress on every
/// poll. A remote error fails this task without retry; a remote cancel
/// cancels it.
pub struct DelegatedTask {
    core: TaskCore,
    pool: Arc<NodePool>,
    poll_interval: Duration,
    origin: Option<String>,
    remote_progress: Mutex<Progress>,
}

impl DelegatedTask {
    pub fn new(
        pool: Arc<NodePool>,
        poll_interval: Duration,
        state: &DelegatedState,
        owner_id: Option<i64>,
    ) -> TaskResult<Self> {
        let core = TaskCore::new(DELEGATED_TASK_TYPE)
            .with_owner(owner_id)
            .with_state(state)?;
        Ok(Self::from_core(core, pool, poll_interval))
    }

    pub fn from_core(core: TaskCore, pool: Arc<NodePool>, poll_interval: Duration) -> Self {
        Self {
            core,
            pool,
            poll_interval,
            origin: None,
            remote_progress: Mutex::new(Progress::new()),
        }
    }

    /// Identifier sent to nodes as the origin of created tasks
    pub fn with_origin(mut self, origin: Option<String>) -> Self {
        self.origin = origin;
        self
    }

    pub fn delegated_state(&self) -> TaskResult<DelegatedState> {
        self.core.state()
    }

    /// Register the `delegated` task type so stored delegations resume
    pub fn register(
        factories: &mut TaskTypeRegistry,
        pool: Arc<NodePool>,
        poll_interval: Duration,
        origin: Option<String>,
    ) {
        factories.register(DELEGATED_TASK_TYPE, move |core| {
            let task = DelegatedTask::from_core(core, Arc::clone(&pool), poll_interval)
                .with_origin(origin.clone());
            Ok(Arc::new(task) as Arc<dyn Task>)
        });
    }

    async fn submit(&self, mut state: DelegatedState, ctx: &TaskContext) -> TaskResult<TaskStatus> {
        let node = self
            .pool
            .allocate(state.capability, state.node_id)
            .map_err(node_error)?;

        let request = CreateTaskRequest {
            task_type: state.remote_type.clone(),
            state: state.payload.clone(),
            owner_id: self.core.owner_id(),
            correlation_id: ctx.correlation_id(),
            origin: self.origin.clone(),
            master_task_id: Some(self.core.id()),
        };
        let remote_task_id = node.client().create_task(request).await.map_err(node_error)?;
        info!(
            node_id = node.id(),
            remote_task_id = %remote_task_id,
            remote_type = %state.remote_type,
            "Remote task created"
        );

        state.node_id = Some(node.id());
        state.remote_task_id = Some(remote_task_id);
        state.phase = DelegationPhase::Monitor;
        self.core.set_state(&state)?;
        Ok(TaskStatus::Suspending)
    }

    async fn monitor(&self, mut state: DelegatedState) -> TaskResult<TaskStatus> {
        let (Some(node_id), Some(remote_task_id)) = (state.node_id, state.remote_task_id) else {
            return Err(TaskError::critical("monitoring without a remote task"));
        };
        let node = self.pool.get(node_id).map_err(TaskError::critical)?;

        let remote = node
            .client()
            .get_task(remote_task_id, true)
            .await
            .map_err(node_error)?;
        if let Some(progress) = remote.progress {
            *self.remote_progress.lock() = progress;
        }
        state.remote_state = Some(remote.private_state);
        debug!(
            node_id,
            remote_task_id = %remote_task_id,
            status = %remote.status,
            "Remote task polled"
        );

        match remote.status {
            TaskStatus::Error => {
                self.core.set_state(&state)?;
                let message = remote.error.unwrap_or_else(|| "unknown error".to_string());
                warn!(
                    node_id,
                    remote_task_id = %remote_task_id,
                    error = %message,
                    "Remote task failed"
                );
                Err(TaskError::critical(format!("remote task failed: {}", message)))
            }
            TaskStatus::Canceled => {
                self.core.set_state(&state)?;
                Ok(TaskStatus::Canceled)
            }
            TaskStatus::Completed => {
                state.phase = DelegationPhase::Finished;
                self.core.set_state(&state)?;
                Ok(TaskStatus::Processing)
            }
            _ => {
                self.core.set_state(&state)?;
                self.core.resume_after(self.poll_interval);
                Ok(TaskStatus::Suspending)
            }
        }
    }
}

fn node_error(err: NodeError) -> TaskError {
    if err.is_retryable() {
        TaskError::retryable(err)
    } else {
        TaskError::critical(err)
    }
}

#[async_trait]
impl Task for DelegatedTask {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    async fn run(&self, ctx: &TaskContext) -> TaskResult<TaskStatus> {
        let state = self.delegated_state()?;
        match state.phase {
            DelegationPhase::Submit => self.submit(state, ctx).await,
            DelegationPhase::Monitor => self.monitor(state).await,
            DelegationPhase::Finished => Ok(TaskStatus::Completed),
        }
    }

    fn progress(&self) -> Progress {
        Progress::new().merged(&self.remote_progress.lock())
    }

    fn summarize(&self) -> Summary {
        let Ok(state) = self.delegated_state() else {
            return Summary::default();
        };
        let mut summary = Summary::new(state.phase.as_str())
            .with_prop("capability", state.capability.as_str())
            .with_prop("remote_type", state.remote_type);
        if let Some(node_id) = state.node_id {
            summary = summary.with_prop("node_id", node_id);
        }
        if let Some(remote_task_id) = state.remote_task_id {
            summary = summary.with_prop("remote_task_id", remote_task_id.as_i64());
        }
        summary
    }
}
