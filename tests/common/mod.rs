//! Workflows and helpers shared by the integration tests
#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use nimbus_core::{
    Progress, ProgressEntry, Summary, Task, TaskContext, TaskCore, TaskError, TaskResult,
    TaskStatus,
};
use nimbus_queue::TaskTypeRegistry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

pub const ARCHIVE_TASK_TYPE: &str = "create_archive";
pub const COMPRESS_TASK_TYPE: &str = "compress";

/// Poll `condition` until it holds or `limit` elapses
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> Result<()> {
    let deadline = Instant::now() + limit;
    while !condition() {
        if Instant::now() >= deadline {
            bail!("condition not met within {:?}", limit);
        }
        sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchivePhase {
    Collect,
    Compress,
    Upload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveState {
    pub phase: ArchivePhase,
    pub files: Vec<String>,
    /// Delay requested before the compress phase, in milliseconds
    #[serde(default)]
    pub wait_before_compress_ms: u64,
}

/// Three-phase workflow that moves between phases without leaving its worker
///
/// With `wait_before_compress_ms` set it instead suspends after collecting,
/// which is how the cold-start test parks it in storage.
pub struct ArchiveTask {
    core: TaskCore,
    pub runs: AtomicUsize,
    pub cleanups: AtomicUsize,
}

impl ArchiveTask {
    pub fn create(files: &[&str], wait_before_compress: Duration) -> TaskResult<Arc<Self>> {
        let state = ArchiveState {
            phase: ArchivePhase::Collect,
            files: files.iter().map(|f| f.to_string()).collect(),
            wait_before_compress_ms: wait_before_compress.as_millis() as u64,
        };
        let core = TaskCore::new(ARCHIVE_TASK_TYPE).with_owner(Some(1)).with_state(&state)?;
        Ok(Arc::new(Self::from_core(core)))
    }

    pub fn from_core(core: TaskCore) -> Self {
        Self {
            core,
            runs: AtomicUsize::new(0),
            cleanups: AtomicUsize::new(0),
        }
    }

    pub fn register(factories: &mut TaskTypeRegistry) {
        factories.register(ARCHIVE_TASK_TYPE, |core| {
            Ok(Arc::new(ArchiveTask::from_core(core)) as Arc<dyn Task>)
        });
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Task for ArchiveTask {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    async fn run(&self, _ctx: &TaskContext) -> TaskResult<TaskStatus> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let mut state: ArchiveState = self.core.state()?;
        match state.phase {
            ArchivePhase::Collect => {
                if state.files.is_empty() {
                    return Err(TaskError::critical("nothing to archive"));
                }
                state.phase = ArchivePhase::Compress;
                self.core.set_state(&state)?;
                if state.wait_before_compress_ms > 0 {
                    self.core
                        .resume_after(Duration::from_millis(state.wait_before_compress_ms));
                    return Ok(TaskStatus::Suspending);
                }
                Ok(TaskStatus::Processing)
            }
            ArchivePhase::Compress => {
                state.phase = ArchivePhase::Upload;
                self.core.set_state(&state)?;
                Ok(TaskStatus::Processing)
            }
            ArchivePhase::Upload => Ok(TaskStatus::Completed),
        }
    }

    fn summarize(&self) -> Summary {
        match self.core.state::<ArchiveState>() {
            Ok(state) => Summary::new(format!("{:?}", state.phase).to_lowercase())
                .with_prop("files", state.files.len()),
            Err(_) => Summary::default(),
        }
    }

    async fn cleanup(&self, _ctx: &TaskContext) -> TaskResult<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fails every iteration with a retryable error, recording when it ran
pub struct FlakyTask {
    core: TaskCore,
    pub attempts: Mutex<Vec<Instant>>,
}

impl FlakyTask {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            core: TaskCore::new("flaky_download"),
            attempts: Mutex::new(Vec::new()),
        })
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl Task for FlakyTask {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    async fn run(&self, _ctx: &TaskContext) -> TaskResult<TaskStatus> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            attempts.push(Instant::now());
            attempts.len()
        };
        Err(TaskError::retryable(format!("remote closed connection (attempt {})", attempt)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressState {
    pub files: u32,
    #[serde(default)]
    pub done: u32,
    #[serde(default)]
    pub fail: bool,
}

/// Slave-side sub-task compressing one file per iteration
pub struct CompressTask {
    core: TaskCore,
}

impl CompressTask {
    pub fn register(factories: &mut TaskTypeRegistry) {
        factories.register(COMPRESS_TASK_TYPE, |core| {
            Ok(Arc::new(CompressTask { core }) as Arc<dyn Task>)
        });
    }
}

#[async_trait]
impl Task for CompressTask {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    async fn run(&self, _ctx: &TaskContext) -> TaskResult<TaskStatus> {
        let mut state: CompressState = self.core.state()?;
        if state.fail {
            return Err(TaskError::critical("archive is corrupted"));
        }
        if state.done >= state.files {
            return Ok(TaskStatus::Completed);
        }
        state.done += 1;
        self.core.set_state(&state)?;
        self.core.resume_after(Duration::from_millis(20));
        Ok(TaskStatus::Suspending)
    }

    fn progress(&self) -> Progress {
        let mut progress = Progress::new();
        if let Ok(state) = self.core.state::<CompressState>() {
            progress.insert(
                "compress",
                ProgressEntry::new(i64::from(state.done), i64::from(state.files)),
            );
        }
        progress
    }
}
