//! The queue engine: submission, transitions, start and shutdown

use chrono::{DateTime, Utc};
use nimbus_core::{Task, TaskContext, TaskId, TaskStatus, Transition, TransitionTable};
use nimbus_interfaces::TaskRepository;
use nimbus_resilience::{RetryPolicy, ShutdownCoordinator};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Span};

use crate::error::{QueueError, QueueResult};
use crate::factory::TaskTypeRegistry;
use crate::metrics::{MetricsSnapshot, QueueMetrics};
use crate::registry::TaskRegistry;
use crate::scheduler::Scheduler;
use crate::worker;

/// Resolved engine settings
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub worker_count: usize,
    pub retry: RetryPolicy,
    pub max_task_execution: Duration,
    pub task_pull_interval: Duration,
    pub resume_task_types: Vec<String>,
}

/// A pool of workers executing tasks from one scheduler
///
/// Cloning a `Queue` yields another handle to the same engine.
#[derive(Clone)]
pub struct Queue {
    inner: Arc<QueueInner>,
}

pub(crate) struct QueueInner {
    pub(crate) name: String,
    pub(crate) settings: QueueSettings,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    repository: Option<Arc<dyn TaskRepository>>,
    factories: TaskTypeRegistry,
    registry: Option<Arc<TaskRegistry>>,
    pub(crate) metrics: QueueMetrics,
    pub(crate) shutdown: Arc<ShutdownCoordinator>,
    /// Wakes the dispatcher when work is pushed
    pub(crate) wake: Notify,
    started: AtomicBool,
    last_local_id: AtomicI64,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Queue {
    pub(crate) fn new(
        name: String,
        settings: QueueSettings,
        scheduler: Arc<dyn Scheduler>,
        repository: Option<Arc<dyn TaskRepository>>,
        factories: TaskTypeRegistry,
        registry: Option<Arc<TaskRegistry>>,
        root: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                name,
                settings,
                scheduler,
                repository,
                factories,
                registry,
                metrics: QueueMetrics::new(),
                shutdown: Arc::new(ShutdownCoordinator::with_token(root)),
                wake: Notify::new(),
                started: AtomicBool::new(false),
                last_local_id: AtomicI64::new(0),
                dispatcher: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.inner.settings
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Number of parked tasks
    pub fn len(&self) -> usize {
        self.inner.scheduler.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutdown.is_shutting_down()
    }

    pub fn registry(&self) -> Option<&Arc<TaskRegistry>> {
        self.inner.registry.as_ref()
    }

    /// Live task by ID, when a registry is configured
    pub fn task(&self, id: TaskId) -> Option<Arc<dyn Task>> {
        self.inner.registry.as_ref().and_then(|registry| registry.get(id))
    }

    /// Reload pending tasks from storage and start dispatching
    pub async fn start(&self) -> QueueResult<()> {
        let inner = &self.inner;
        if inner.shutdown.is_shutting_down() {
            return Err(QueueError::ShutDown);
        }
        if inner.started.swap(true, Ordering::SeqCst) {
            return Err(QueueError::AlreadyStarted);
        }

        if let Err(err) = inner.resume_pending().await {
            inner.started.store(false, Ordering::SeqCst);
            error!(queue = %inner.name, error = %err, "Failed to load pending tasks");
            return Err(err);
        }

        let handle = tokio::spawn(worker::dispatch(Arc::clone(inner)));
        *inner.dispatcher.lock() = Some(handle);

        info!(
            queue = %inner.name,
            workers = inner.settings.worker_count,
            "Queue started"
        );
        Ok(())
    }

    /// Submit a task, returning its ID
    ///
    /// A brand-new task is moved to `queued`, which writes its first record.
    /// Suspended tasks are parked again by the engine itself, so a task that
    /// already has a status is rejected rather than scheduled twice.
    pub async fn queue_task(&self, task: Arc<dyn Task>) -> QueueResult<TaskId> {
        let inner = &self.inner;
        if inner.shutdown.is_shutting_down() {
            return Err(QueueError::ShutDown);
        }

        if let Some(current) = task.status() {
            return Err(QueueError::invalid_transition(Some(current), TaskStatus::Queued));
        }
        inner.assign_local_id(task.as_ref());
        inner.transition(&task, TaskStatus::Queued).await?;

        let id = task.id();
        inner.enqueue(task)?;
        debug!(queue = %inner.name, task_id = %id, "Task queued");
        Ok(id)
    }

    /// Stop dispatching and wait for running workers
    ///
    /// Running tasks see their context canceled and get the rest of their
    /// execution budget to return. Calling this more than once is a no-op.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        if !inner.shutdown.begin() {
            return;
        }
        info!(queue = %inner.name, "Shutting down queue");

        if let Err(err) = inner.scheduler.shutdown() {
            warn!(queue = %inner.name, error = %err, "Scheduler shutdown failed");
        }
        inner.wake.notify_waiters();

        let handle = inner.dispatcher.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!(queue = %inner.name, error = %err, "Dispatcher ended abnormally");
            }
        }

        inner.shutdown.wait_idle().await;
        info!(queue = %inner.name, "Queue stopped");
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.inner.name)
            .field("settings", &self.inner.settings)
            .field("parked", &self.len())
            .finish()
    }
}

impl QueueInner {
    fn assign_local_id(&self, task: &dyn Task) {
        let persisted_by_store = self.repository.is_some() && task.should_persist();
        if persisted_by_store || task.id() != TaskId::default() {
            return;
        }
        let id = match &self.registry {
            Some(registry) => registry.next_id(),
            None => TaskId(self.last_local_id.fetch_add(1, Ordering::SeqCst) + 1),
        };
        task.core().set_id(id);
    }

    fn enqueue(&self, task: Arc<dyn Task>) -> QueueResult<()> {
        let id = task.id();
        if let Some(registry) = &self.registry {
            registry.set(Arc::clone(&task));
        }
        if let Err(err) = self.scheduler.push(task) {
            if let Some(registry) = &self.registry {
                registry.delete(id);
            }
            warn!(queue = %self.name, task_id = %id, error = %err, "Failed to park task");
            return Err(err);
        }
        self.wake.notify_one();
        Ok(())
    }

    async fn resume_pending(&self) -> QueueResult<()> {
        let types = &self.settings.resume_task_types;
        let Some(repository) = &self.repository else {
            return Ok(());
        };
        if types.is_empty() {
            return Ok(());
        }

        let records = repository.find_pending(types).await?;
        let mut resumed = 0usize;
        for record in records {
            let task = match self.factories.build(&record) {
                Ok(task) => task,
                Err(err) => {
                    warn!(
                        queue = %self.name,
                        task_id = %record.id,
                        task_type = %record.task_type,
                        error = %err,
                        "Skipping task that cannot be resumed"
                    );
                    continue;
                }
            };
            if task.status() == Some(TaskStatus::Suspending) {
                self.metrics.suspended();
            }
            if self.enqueue(task).is_ok() {
                resumed += 1;
            }
        }

        info!(queue = %self.name, resumed, "Resumed pending tasks");
        Ok(())
    }

    /// Move a task to `to`, running the bookkeeping of the transition
    ///
    /// A missing table entry or a failed write aborts the transition and
    /// leaves the task's status untouched.
    pub(crate) async fn transition(&self, task: &Arc<dyn Task>, to: TaskStatus) -> QueueResult<()> {
        let core = task.core();
        let from = core.status();
        let Some(kind) = TransitionTable::lookup(from, to) else {
            let err = QueueError::invalid_transition(from, to);
            error!(
                queue = %self.name,
                task_id = %core.id(),
                error = %err,
                "Rejected task transition"
            );
            return Err(err);
        };

        core.set_status(to);
        if kind == Transition::Suspend {
            let delay = core.take_resume_delay();
            core.on_suspend(resume_time_after(delay));
        }

        if let Err(err) = self.persist(task).await {
            core.restore_status(from);
            error!(
                queue = %self.name,
                task_id = %core.id(),
                to = %to,
                error = %err,
                "Failed to persist task transition"
            );
            return Err(err);
        }

        match kind {
            Transition::Submit => self.metrics.submitted(),
            Transition::Start => self.metrics.worker_started(),
            Transition::Resume => {
                self.metrics.resumed();
                self.metrics.worker_started();
            }
            Transition::Checkpoint => {}
            Transition::Suspend => {
                self.metrics.worker_released();
                self.metrics.suspended();
            }
            Transition::Complete => {
                self.metrics.worker_released();
                self.metrics.succeeded();
            }
            Transition::Fail => {
                self.metrics.worker_released();
                self.metrics.failed();
            }
            Transition::Cancel => {
                self.metrics.worker_released();
                self.metrics.canceled();
            }
        }
        debug!(task_id = %core.id(), transition = ?kind, status = %to, "Task transition");

        if kind.finishes_processing() {
            let ctx = TaskContext::new(
                self.shutdown.child_token(),
                Span::current(),
                core.correlation_id(),
            )
            .with_owner(core.owner_id());
            if let Err(err) = task.cleanup(&ctx).await {
                warn!(task_id = %core.id(), error = %err, "Task cleanup failed");
            }
            if let Some(registry) = &self.registry {
                registry.delete(core.id());
            }
        }

        if kind == Transition::Suspend {
            match self.scheduler.push(Arc::clone(task)) {
                Ok(()) => self.wake.notify_one(),
                Err(QueueError::ShutDown) => {
                    debug!(task_id = %core.id(), "Queue closed, suspended task left in storage");
                }
                Err(err) => {
                    error!(task_id = %core.id(), error = %err, "Failed to park suspended task");
                    self.metrics.resumed();
                    if let Some(registry) = &self.registry {
                        registry.delete(core.id());
                    }
                }
            }
        }

        Ok(())
    }

    async fn persist(&self, task: &Arc<dyn Task>) -> QueueResult<()> {
        let Some(repository) = &self.repository else {
            return Ok(());
        };
        if !task.should_persist() {
            return Ok(());
        }

        let core = task.core();
        if !core.is_persisted() {
            if let Some(record) = core.to_new_record() {
                let stored = repository.create(record).await?;
                core.mark_persisted(stored.id);
            }
        } else if let Some(update) = core.to_update() {
            repository.update(core.id(), update).await?;
        }
        Ok(())
    }
}

fn resume_time_after(delay: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delay| now.checked_add_signed(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
