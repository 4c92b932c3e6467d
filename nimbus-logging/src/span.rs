use nimbus_core::TaskId;
use tracing::Span;
use uuid::Uuid;

/// Span wrapping every iteration of a task
pub fn task_span(queue: &str, task_id: TaskId, task_type: &str, correlation_id: Uuid) -> Span {
    tracing::info_span!(
        "task",
        queue = %queue,
        task_id = %task_id,
        task_type = %task_type,
        correlation_id = %correlation_id,
    )
}
