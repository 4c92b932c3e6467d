//! Queue engine for Nimbus tasks
//!
//! A [`Queue`] owns a scheduler of parked tasks and a fixed pool of workers.
//! Workers drive each task through the status machine defined in
//! `nimbus-core`, persist every transition through a
//! [`nimbus_interfaces::TaskRepository`], retry transient failures with
//! backoff, and park tasks that ask to be resumed later.
//!
//! ```ignore
//! let mut factories = TaskTypeRegistry::new();
//! factories.register("create_archive", |core| {
//!     Ok(Arc::new(ArchiveTask::new(core)) as Arc<dyn Task>)
//! });
//!
//! let queue = QueueBuilder::new("io_intense")
//!     .worker_count(4)
//!     .repository(repository)
//!     .factories(factories)
//!     .resume_task_types(["create_archive"])
//!     .build();
//! queue.start().await?;
//! let id = queue.queue_task(Arc::new(ArchiveTask::create(owner, files)?)).await?;
//! ```

pub mod builder;
pub mod error;
pub mod factory;
pub mod metrics;
pub mod queue;
pub mod registry;
pub mod scheduler;

mod worker;

#[cfg(test)]
mod test_support;

pub use builder::QueueBuilder;
pub use error::{QueueError, QueueResult};
pub use factory::{TaskFactory, TaskTypeRegistry};
pub use metrics::{MetricsSnapshot, QueueMetrics};
pub use queue::Queue;
pub use registry::TaskRegistry;
pub use scheduler::{ResumeTimeScheduler, Scheduler};
