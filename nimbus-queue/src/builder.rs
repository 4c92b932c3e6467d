//! Typed construction of a [`Queue`]

use nimbus_config::QueueConfig;
use nimbus_interfaces::TaskRepository;
use nimbus_resilience::{BackoffStrategy, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::factory::TaskTypeRegistry;
use crate::queue::{Queue, QueueSettings};
use crate::registry::TaskRegistry;
use crate::scheduler::{ResumeTimeScheduler, Scheduler};

/// Builder for [`Queue`]
///
/// Defaults: one worker per CPU core, 3 retries with exponential backoff
/// (factor 2, 1s initial, 60s cap), 2h execution budget per task and a 1s
/// pull interval.
pub struct QueueBuilder {
    name: String,
    config: QueueConfig,
    repository: Option<Arc<dyn TaskRepository>>,
    factories: TaskTypeRegistry,
    registry: Option<Arc<TaskRegistry>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    parent_token: Option<CancellationToken>,
}

impl QueueBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(name, &QueueConfig::default())
    }

    /// Seed the builder from a configured queue
    pub fn from_config(name: impl Into<String>, config: &QueueConfig) -> Self {
        Self {
            name: name.into(),
            config: config.clone(),
            repository: None,
            factories: TaskTypeRegistry::new(),
            registry: None,
            scheduler: None,
            parent_token: None,
        }
    }

    pub fn worker_count(mut self, worker_count: usize) -> Self {
        self.config.worker_count = worker_count;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.retry.max_retries = max_retries;
        self
    }

    pub fn backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.config.retry.strategy = strategy;
        self
    }

    /// Exponential backoff with the given factor
    pub fn backoff_factor(self, factor: f64) -> Self {
        self.backoff(BackoffStrategy::Exponential { factor })
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.config.retry.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.retry.max_delay = delay;
        self
    }

    /// Wait exactly `delay` before every retry instead of backing off
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry.retry_delay = Some(delay);
        self
    }

    pub fn jitter(mut self, jitter: bool) -> Self {
        self.config.retry.jitter = jitter;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn max_task_execution(mut self, budget: Duration) -> Self {
        self.config.max_task_execution = budget;
        self
    }

    pub fn task_pull_interval(mut self, interval: Duration) -> Self {
        self.config.task_pull_interval = interval;
        self
    }

    /// Task types reloaded from storage when the queue starts
    pub fn resume_task_types<I, S>(mut self, task_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.resume_task_types = task_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn scheduler_capacity(mut self, capacity: usize) -> Self {
        self.config.scheduler_capacity = Some(capacity);
        self
    }

    pub fn repository(mut self, repository: Arc<dyn TaskRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn factories(mut self, factories: TaskTypeRegistry) -> Self {
        self.factories = factories;
        self
    }

    pub fn registry(mut self, registry: Arc<TaskRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace the default resume-time scheduler
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Shut the queue's tasks down when `token` is canceled
    pub fn parent_token(mut self, token: CancellationToken) -> Self {
        self.parent_token = Some(token);
        self
    }

    pub fn build(self) -> Queue {
        let scheduler = match self.scheduler {
            Some(scheduler) => scheduler,
            None => {
                let scheduler = match self.config.scheduler_capacity {
                    Some(capacity) => ResumeTimeScheduler::with_capacity(capacity),
                    None => ResumeTimeScheduler::new(),
                };
                Arc::new(scheduler) as Arc<dyn Scheduler>
            }
        };
        let root = match self.parent_token {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };

        let settings = QueueSettings {
            worker_count: self.config.worker_count.max(1),
            retry: self.config.retry,
            max_task_execution: self.config.max_task_execution,
            task_pull_interval: self.config.task_pull_interval,
            resume_task_types: self.config.resume_task_types,
        };

        Queue::new(
            self.name,
            settings,
            scheduler,
            self.repository,
            self.factories,
            self.registry,
            root,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_config() {
        let config = QueueConfig {
            worker_count: 8,
            ..Default::default()
        };
        let queue = QueueBuilder::from_config("thumb", &config)
            .max_retries(1)
            .retry_delay(Duration::from_millis(5))
            .build();

        assert_eq!(queue.name(), "thumb");
        assert_eq!(queue.settings().worker_count, 8);
        assert_eq!(queue.settings().retry.max_retries, 1);
        assert_eq!(queue.settings().retry.retry_delay, Some(Duration::from_millis(5)));
    }

    #[test]
    fn test_zero_workers_clamped() {
        let queue = QueueBuilder::new("q").worker_count(0).build();
        assert_eq!(queue.settings().worker_count, 1);
    }
}
