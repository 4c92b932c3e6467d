//! Retry policy applied to failed task iterations

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backoff::{BackoffCalculator, BackoffStrategy};

/// Retry policy configuration
///
/// `max_retries` counts retries on top of the first attempt, so a policy with
/// `max_retries = 2` runs a failing iteration at most three times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,

    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    pub strategy: BackoffStrategy,

    /// Fixed delay that replaces the computed backoff when set
    #[serde(with = "humantime_serde")]
    pub retry_delay: Option<Duration>,

    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::default(),
            retry_delay: None,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Policy that waits the same delay before every retry
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Whether a task that has already been retried `retried` times may run again
    pub fn should_retry(&self, retried: u32) -> bool {
        retried < self.max_retries
    }

    /// Delay before retry number `attempt` (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if let Some(delay) = self.retry_delay {
            return delay;
        }
        BackoffCalculator::new(
            self.strategy.clone(),
            self.initial_delay,
            self.max_delay,
            self.jitter,
        )
        .calculate_delay(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
    }

    #[test]
    fn test_fixed_override() {
        let policy = RetryPolicy::fixed(5, Duration::from_millis(20));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(20));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(20));
    }

    #[test]
    fn test_none_never_retries() {
        assert!(!RetryPolicy::none().should_retry(0));
    }

    #[test]
    fn test_yaml_with_humantime() {
        let yaml = r#"
max_retries: 2
initial_delay: 500ms
retry_delay: 3s
strategy:
  type: linear
"#;
        let policy: RetryPolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.initial_delay, Duration::from_millis(500));
        assert_eq!(policy.retry_delay, Some(Duration::from_secs(3)));
        assert_eq!(policy.strategy, BackoffStrategy::Linear);
        assert_eq!(policy.max_delay, Duration::from_secs(60));
    }
}
