//! Dispatcher and worker loop

use futures::FutureExt;
use nimbus_core::{Task, TaskContext, TaskCore, TaskError, TaskStatus};
use nimbus_logging::task_span;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{sleep, sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument, Span};

use crate::error::{QueueError, QueueResult};
use crate::queue::QueueInner;

/// Hand due tasks to workers until the queue shuts down
///
/// Holds one semaphore permit per running worker, so at most
/// `worker_count` tasks are processing at any time.
pub(crate) async fn dispatch(inner: Arc<QueueInner>) {
    let permits = Arc::new(Semaphore::new(inner.settings.worker_count));
    let token = inner.shutdown.token().clone();

    loop {
        let permit = tokio::select! {
            _ = token.cancelled() => break,
            permit = Arc::clone(&permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let Some(task) = next_task(&inner, &token).await else {
            break;
        };

        let guard = inner.shutdown.track();
        let worker = Arc::clone(&inner);
        tokio::spawn(async move {
            worker.work(task).await;
            drop(permit);
            drop(guard);
        });
    }

    debug!(queue = %inner.name, "Dispatcher stopped");
}

async fn next_task(inner: &QueueInner, token: &CancellationToken) -> Option<Arc<dyn Task>> {
    loop {
        if token.is_cancelled() {
            return None;
        }

        let notified = inner.wake.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        match inner.scheduler.request() {
            Ok(task) => return Some(task),
            Err(QueueError::NoTaskReady) => {}
            Err(QueueError::ShutDown) => return None,
            Err(err) => error!(queue = %inner.name, error = %err, "Scheduler request failed"),
        }

        let pull = inner.settings.task_pull_interval;
        let wait = inner
            .scheduler
            .time_until_ready()
            .map_or(pull, |ready| ready.min(pull));

        tokio::select! {
            _ = token.cancelled() => return None,
            _ = &mut notified => {}
            _ = sleep(wait) => {}
        }
    }
}

impl QueueInner {
    async fn work(self: &Arc<Self>, task: Arc<dyn Task>) {
        let core = task.core();
        let span = task_span(&self.name, core.id(), &core.task_type(), core.correlation_id());

        let outcome = AssertUnwindSafe(self.drive(&task, &span).instrument(span.clone()))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(
                    parent: &span,
                    error = %err,
                    "Task left unfinished after a failed transition"
                );
            }
            Err(payload) => {
                let err = TaskError::Panicked(panic_message(payload.as_ref()));
                error!(parent: &span, error = %err, "Task panicked");
                core.on_error(&err);
                if let Err(err) = self
                    .transition(&task, TaskStatus::Error)
                    .instrument(span.clone())
                    .await
                {
                    error!(parent: &span, error = %err, "Failed to record task panic");
                }
            }
        }
    }

    /// Run iterations back to back until the task leaves `processing`
    async fn drive(&self, task: &Arc<dyn Task>, span: &Span) -> QueueResult<()> {
        self.transition(task, TaskStatus::Processing).await?;
        loop {
            let next = self.run_iteration(task, span).await;
            self.transition(task, next).await?;
            if next != TaskStatus::Processing {
                return Ok(());
            }
        }
    }

    async fn run_iteration(&self, task: &Arc<dyn Task>, span: &Span) -> TaskStatus {
        let core = task.core();
        let limit = self.settings.max_task_execution;
        let budget = limit.saturating_sub(core.executed());
        if budget.is_zero() {
            let err = TaskError::Timeout(limit);
            warn!(error = %err, "Task has no execution time left");
            core.on_error(&err);
            return TaskStatus::Error;
        }

        let started = Instant::now();
        let deadline = started + budget;
        let cancel = self.shutdown.child_token();
        let ctx = TaskContext::new(cancel.clone(), span.clone(), core.correlation_id())
            .with_owner(core.owner_id())
            .with_deadline(deadline);

        let run = task.run(&ctx);
        tokio::pin!(run);

        let result = tokio::select! {
            result = &mut run => result,
            _ = sleep_until(deadline) => {
                cancel.cancel();
                Err(TaskError::Timeout(limit))
            }
            _ = self.shutdown.token().cancelled() => {
                timeout_at(deadline, &mut run)
                    .await
                    .unwrap_or(Err(TaskError::Timeout(limit)))
            }
        };
        core.add_executed(started.elapsed());

        let next = match result {
            Ok(TaskStatus::Queued) => {
                let err = TaskError::critical("run returned 'queued'");
                core.on_error(&err);
                TaskStatus::Error
            }
            Ok(TaskStatus::Processing) if self.shutdown.is_shutting_down() => {
                debug!("Parking task between phases for shutdown");
                TaskStatus::Suspending
            }
            Ok(status) => status,
            Err(err) => self.handle_failure(core, err),
        };

        // A resume delay only applies to the suspension it was requested for
        if next != TaskStatus::Suspending {
            core.take_resume_delay();
        }
        next
    }

    fn handle_failure(&self, core: &TaskCore, err: TaskError) -> TaskStatus {
        let policy = &self.settings.retry;
        let retry = err.is_retryable()
            && policy.should_retry(core.retried())
            && !self.shutdown.is_shutting_down();

        if !retry {
            warn!(error = %err, retried = core.retried(), "Task failed");
            core.on_error(&err);
            return TaskStatus::Error;
        }

        let attempt = core.on_retry(&err);
        let delay = policy.delay_for_attempt(attempt);
        self.metrics.retried();
        core.resume_after(delay);
        info!(attempt, delay = ?delay, error = %err, "Retrying task");
        TaskStatus::Suspending
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
