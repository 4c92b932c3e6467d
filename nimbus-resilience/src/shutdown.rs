//! Graceful shutdown coordination
//!
//! A [`ShutdownCoordinator`] owns the root cancellation token of an engine and
//! counts the work still in flight. Workers hold an [`ActiveTaskGuard`] for as
//! long as they run; the owner calls [`ShutdownCoordinator::begin`] once and
//! then waits for the count to drop to zero.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Graceful shutdown coordinator
#[derive(Debug)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    shutting_down: AtomicBool,
    active_tasks: AtomicUsize,
    idle: Notify,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Coordinate shutdown under an existing (possibly parent-linked) token
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            shutting_down: AtomicBool::new(false),
            active_tasks: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    /// Root token canceled when shutdown begins
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Check if shutdown is in progress
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst) || self.token.is_cancelled()
    }

    /// Start shutting down; returns `false` if another caller already did
    pub fn begin(&self) -> bool {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already in progress");
            return false;
        }
        info!(active_tasks = self.active_task_count(), "Starting graceful shutdown");
        self.token.cancel();
        true
    }

    /// Count a unit of work as active until the returned guard drops
    pub fn track(self: &Arc<Self>) -> ActiveTaskGuard {
        self.active_tasks.fetch_add(1, Ordering::SeqCst);
        ActiveTaskGuard {
            coordinator: Arc::clone(self),
        }
    }

    pub fn active_task_count(&self) -> usize {
        self.active_tasks.load(Ordering::SeqCst)
    }

    /// Wait until no tracked work remains
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.active_task_count() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Wait for tracked work, giving up after `limit`
    pub async fn wait_for_tasks(&self, limit: Duration) -> Result<(), ShutdownError> {
        match timeout(limit, self.wait_idle()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                let remaining = self.active_task_count();
                warn!(remaining, "Shutdown timed out with tasks still active");
                Err(ShutdownError::TasksRemaining(remaining))
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks one unit of work as active
#[derive(Debug)]
pub struct ActiveTaskGuard {
    coordinator: Arc<ShutdownCoordinator>,
}

impl Drop for ActiveTaskGuard {
    fn drop(&mut self) {
        if self.coordinator.active_tasks.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.coordinator.idle.notify_waiters();
        }
    }
}

/// Shutdown errors
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("Shutdown completed with {0} tasks still active")]
    TasksRemaining(usize),
}
