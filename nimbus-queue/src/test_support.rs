//! Scripted tasks shared by the unit tests of this crate

use async_trait::async_trait;
use nimbus_core::{Task, TaskContext, TaskCore, TaskError, TaskResult, TaskStatus};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Step {
    Return(TaskStatus),
    Retryable(&'static str),
    Critical(&'static str),
    Panic(&'static str),
    /// Suspend and ask to be resumed after the delay
    SuspendFor(Duration),
    /// Request a resume delay, then return the status anyway
    RequestResume(Duration, TaskStatus),
    /// Sleep, ignoring cancellation, then return the status
    Sleep(Duration, TaskStatus),
    /// Wait for cancellation, then return the status
    UntilCancelled(TaskStatus),
}

/// Task that replays a fixed script; the last step repeats
pub struct ScriptedTask {
    core: TaskCore,
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    pub runs: AtomicUsize,
    pub cleanups: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedTask {
    pub fn new(task_type: &str, steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Self::with_core(TaskCore::new(task_type), steps)
    }

    pub fn with_core(core: TaskCore, steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            core,
            steps: Mutex::new(steps.into_iter().collect()),
            last: Mutex::new(None),
            runs: AtomicUsize::new(0),
            cleanups: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn completing(task_type: &str) -> Arc<Self> {
        Self::new(task_type, [Step::Return(TaskStatus::Completed)])
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }

    /// Most `run` calls ever in progress at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock();
        let mut last = self.last.lock();
        if let Some(step) = steps.pop_front() {
            *last = Some(step.clone());
            return step;
        }
        last.clone().unwrap_or(Step::Return(TaskStatus::Completed))
    }
}

#[async_trait]
impl Task for ScriptedTask {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    async fn run(&self, ctx: &TaskContext) -> TaskResult<TaskStatus> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        match self.next_step() {
            Step::Return(status) => Ok(status),
            Step::Retryable(message) => Err(TaskError::retryable(message)),
            Step::Critical(message) => Err(TaskError::critical(message)),
            Step::Panic(message) => panic!("{}", message),
            Step::SuspendFor(delay) => {
                self.core.resume_after(delay);
                Ok(TaskStatus::Suspending)
            }
            Step::RequestResume(delay, status) => {
                self.core.resume_after(delay);
                Ok(status)
            }
            Step::Sleep(delay, status) => {
                tokio::time::sleep(delay).await;
                Ok(status)
            }
            Step::UntilCancelled(status) => {
                ctx.cancelled().await;
                Ok(status)
            }
        }
    }

    async fn cleanup(&self, _ctx: &TaskContext) -> TaskResult<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
