//! Domain-specific configuration modules

pub mod cluster;
pub mod logging;
pub mod queue;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main Nimbus configuration combining all domains
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NimbusConfig {
    /// Queue engines keyed by queue name
    pub queues: BTreeMap<String, queue::QueueConfig>,

    pub cluster: cluster::ClusterConfig,

    pub logging: logging::LoggingConfig,
}

impl NimbusConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        for queue in self.queues.values() {
            queue.validate()?;
        }
        self.cluster.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Settings of a named queue, falling back to defaults
    pub fn queue(&self, name: &str) -> queue::QueueConfig {
        self.queues.get(name).cloned().unwrap_or_default()
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let mut config = NimbusConfig::default();
        config
            .queues
            .insert("io_intense".to_string(), queue::QueueConfig::default());
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_parses_back() {
        let sample = NimbusConfig::generate_sample();
        let config: NimbusConfig = serde_yaml::from_str(&sample).unwrap();
        assert!(config.queues.contains_key("io_intense"));
        assert!(config.validate_all().is_ok());
    }

    #[test]
    fn test_unknown_queue_uses_defaults() {
        let config = NimbusConfig::default();
        assert_eq!(config.queue("thumb"), queue::QueueConfig::default());
    }
}
