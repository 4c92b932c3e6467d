//! Queue engine configuration

use nimbus_resilience::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};

/// Settings for one queue engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Concurrent workers; defaults to the number of CPU cores
    pub worker_count: usize,

    pub retry: RetryPolicy,

    /// Total run time a task may accumulate across iterations
    #[serde(with = "humantime_serde")]
    pub max_task_execution: Duration,

    /// How often the dispatcher polls when nothing is ready
    #[serde(with = "humantime_serde")]
    pub task_pull_interval: Duration,

    /// Task types reloaded from storage on start
    pub resume_task_types: Vec<String>,

    /// Upper bound on parked tasks; unbounded when unset
    pub scheduler_capacity: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            retry: RetryPolicy::default(),
            max_task_execution: default_max_task_execution(),
            task_pull_interval: Duration::from_secs(1),
            resume_task_types: Vec::new(),
            scheduler_capacity: None,
        }
    }
}

fn default_max_task_execution() -> Duration {
    Duration::from_secs(2 * 60 * 60)
}

impl Validatable for QueueConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.worker_count, "worker_count", self.domain_name())?;

        if self.max_task_execution.is_zero() {
            return Err(self.validation_error("max_task_execution must be greater than 0"));
        }
        if self.task_pull_interval.is_zero() {
            return Err(self.validation_error("task_pull_interval must be greater than 0"));
        }
        if self.retry.initial_delay > self.retry.max_delay {
            return Err(self.validation_error("retry.initial_delay cannot exceed retry.max_delay"));
        }
        if let Some(capacity) = self.scheduler_capacity {
            validate_positive(capacity, "scheduler_capacity", self.domain_name())?;
        }
        for task_type in &self.resume_task_types {
            validate_required_string(task_type, "resume_task_types entry", self.domain_name())?;
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "queue"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QueueConfig::default();
        assert!(config.worker_count >= 1);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.max_task_execution, Duration::from_secs(7200));
        assert_eq!(config.task_pull_interval, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
worker_count: 4
max_task_execution: 30m
resume_task_types: [create_archive, extract_archive]
retry:
  max_retries: 5
  initial_delay: 2s
"#;
        let config: QueueConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.max_task_execution, Duration::from_secs(1800));
        assert_eq!(config.resume_task_types.len(), 2);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(2));
        assert_eq!(config.task_pull_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_validation_failures() {
        let config = QueueConfig {
            worker_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = QueueConfig::default();
        config.retry.initial_delay = Duration::from_secs(120);
        assert!(config.validate().is_err());

        let config = QueueConfig {
            resume_task_types: vec![" ".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
