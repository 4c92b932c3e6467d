//! Per-iteration execution context

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Span;
use uuid::Uuid;

/// Everything a task needs from the engine while one iteration runs
///
/// The cancellation token is a child of the engine's root token, so it fires
/// when the queue shuts down or when the iteration runs out of time.
#[derive(Debug, Clone)]
pub struct TaskContext {
    cancel: CancellationToken,
    span: Span,
    correlation_id: Uuid,
    owner_id: Option<i64>,
    deadline: Option<Instant>,
}

impl TaskContext {
    pub fn new(cancel: CancellationToken, span: Span, correlation_id: Uuid) -> Self {
        Self {
            cancel,
            span,
            correlation_id,
            owner_id: None,
            deadline: None,
        }
    }

    /// Context that is not tied to any engine, for hooks and tests
    pub fn detached(correlation_id: Uuid) -> Self {
        Self::new(CancellationToken::new(), Span::none(), correlation_id)
    }

    pub fn with_owner(mut self, owner_id: Option<i64>) -> Self {
        self.owner_id = owner_id;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn owner_id(&self) -> Option<i64> {
        self.owner_id
    }

    /// Tracing span carrying the task's correlation fields
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the iteration should stop
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Time left before the iteration deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_child_token_follows_parent() {
        let root = CancellationToken::new();
        let ctx = TaskContext::new(root.child_token(), Span::none(), Uuid::new_v4())
            .with_owner(Some(7));

        assert_eq!(ctx.owner_id(), Some(7));
        assert!(!ctx.is_cancelled());

        root.cancel();
        ctx.cancelled().await;
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_remaining_budget() {
        let ctx = TaskContext::detached(Uuid::new_v4())
            .with_deadline(Instant::now() + Duration::from_secs(60));
        let remaining = ctx.remaining().unwrap();
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(59));

        assert!(TaskContext::detached(Uuid::new_v4()).remaining().is_none());
    }
}
