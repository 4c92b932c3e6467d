//! Slave side of the node API
//!
//! [`SlaveTaskHost`] turns create requests into non-persistent tasks on its
//! own queue and answers polls from the live task registry. Finished tasks
//! stay queryable for a retention window so the master can read their
//! final state.

use async_trait::async_trait;
use nimbus_core::{DelegationProps, NodeId, Task, TaskCore, TaskId};
use nimbus_interfaces::{CreateTaskRequest, NodeClient, NodeError, NodeResult, RemoteTaskSnapshot};
use nimbus_queue::{Queue, QueueBuilder, QueueError, TaskRegistry, TaskTypeRegistry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::ClusterResult;

struct Retained {
    snapshot: RemoteTaskSnapshot,
    finished_at: Instant,
}

#[derive(Default)]
struct Hosted {
    running: HashMap<TaskId, Arc<dyn Task>>,
    finished: HashMap<TaskId, Retained>,
}

pub struct SlaveTaskHost {
    node_id: NodeId,
    queue: Queue,
    registry: Arc<TaskRegistry>,
    factories: TaskTypeRegistry,
    retention: Duration,
    hosted: Mutex<Hosted>,
}

impl SlaveTaskHost {
    /// Build and start the slave queue
    ///
    /// The queue gets its own task registry, which also hands out the IDs of
    /// the hosted tasks.
    pub async fn start(
        node_id: NodeId,
        queue: QueueBuilder,
        factories: TaskTypeRegistry,
        retention: Duration,
    ) -> ClusterResult<Self> {
        let registry = Arc::new(TaskRegistry::new());
        let queue = queue.registry(Arc::clone(&registry)).build();
        queue.start().await?;

        info!(node_id, task_types = ?factories.task_types(), "Slave task host started");
        Ok(Self {
            node_id,
            queue,
            registry,
            factories,
            retention,
            hosted: Mutex::new(Hosted::default()),
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }

    /// Move finished tasks to the retention map and drop expired ones
    fn sweep(&self) {
        let mut hosted = self.hosted.lock();
        let now = Instant::now();

        let done: Vec<TaskId> = hosted
            .running
            .iter()
            .filter(|(_, task)| task.status().is_some_and(|status| status.is_terminal()))
            .map(|(id, _)| *id)
            .collect();
        for id in done {
            if let Some(task) = hosted.running.remove(&id) {
                let snapshot = RemoteTaskSnapshot::from_snapshot(task.snapshot(), true);
                hosted.finished.insert(id, Retained { snapshot, finished_at: now });
            }
        }

        let retention = self.retention;
        hosted
            .finished
            .retain(|_, retained| now.duration_since(retained.finished_at) < retention);
    }
}

fn rejection(err: QueueError) -> NodeError {
    match err {
        QueueError::ShutDown => NodeError::Transport("slave queue is shut down".to_string()),
        QueueError::UnknownTaskType(task_type) => NodeError::Rejected {
            code: 404,
            message: format!("unknown task type: {}", task_type),
        },
        other => NodeError::Rejected {
            code: 500,
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl NodeClient for SlaveTaskHost {
    async fn create_task(&self, request: CreateTaskRequest) -> NodeResult<TaskId> {
        self.sweep();

        let core = TaskCore::new(request.task_type.as_str())
            .with_private_state(request.state)
            .with_owner(request.owner_id)
            .with_correlation_id(request.correlation_id)
            .non_persistent();
        core.set_delegation(DelegationProps {
            origin: request.origin,
            node_id: self.node_id,
            remote_task_id: request.master_task_id,
        });

        let task = self.factories.build_with_core(core).map_err(rejection)?;
        let id = self.queue.queue_task(Arc::clone(&task)).await.map_err(rejection)?;
        self.hosted.lock().running.insert(id, task);

        info!(task_id = %id, task_type = %request.task_type, "Hosting delegated task");
        Ok(id)
    }

    async fn get_task(&self, id: TaskId, include_progress: bool) -> NodeResult<RemoteTaskSnapshot> {
        if let Some(task) = self.registry.get(id) {
            return Ok(RemoteTaskSnapshot::from_snapshot(task.snapshot(), include_progress));
        }

        self.sweep();
        let hosted = self.hosted.lock();
        if let Some(task) = hosted.running.get(&id) {
            return Ok(RemoteTaskSnapshot::from_snapshot(task.snapshot(), include_progress));
        }
        match hosted.finished.get(&id) {
            Some(retained) => {
                let mut snapshot = retained.snapshot.clone();
                if !include_progress {
                    snapshot.progress = None;
                }
                Ok(snapshot)
            }
            None => {
                debug!(task_id = %id, "Unknown or expired task");
                Err(NodeError::NotFound(id))
            }
        }
    }
}
