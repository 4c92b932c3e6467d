//! Configuration loading and environment variable handling

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::domains::cluster::ClusterConfig;
use crate::domains::logging::{LogFormat, LogLevel, LoggingConfig};
use crate::domains::queue::QueueConfig;
use crate::domains::NimbusConfig;
use crate::error::{ConfigError, ConfigResult};

/// Configuration loader with environment variable support
///
/// Recognized variables (with the default `NIMBUS` prefix):
/// `NIMBUS_LOG_LEVEL`, `NIMBUS_LOG_FORMAT`, `NIMBUS_LOG_FILTER`,
/// `NIMBUS_CLUSTER_ORIGIN`, `NIMBUS_CLUSTER_POLL_INTERVAL`, and per configured
/// queue `NIMBUS_QUEUE_<NAME>_WORKER_COUNT`, `..._MAX_RETRIES`,
/// `..._MAX_TASK_EXECUTION`.
pub struct ConfigLoader {
    prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            prefix: "NIMBUS".to_string(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<NimbusConfig> {
        let content = std::fs::read_to_string(path)?;
        self.from_yaml(&content)
    }

    /// Parse YAML text, then apply environment overrides and validate
    pub fn from_yaml(&self, content: &str) -> ConfigResult<NimbusConfig> {
        let mut config: NimbusConfig = serde_yaml::from_str(content)?;
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<NimbusConfig> {
        let mut config = NimbusConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<NimbusConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn apply_env_overrides(&self, config: &mut NimbusConfig) -> ConfigResult<()> {
        self.apply_logging_overrides(&mut config.logging)?;
        self.apply_cluster_overrides(&mut config.cluster)?;
        for (name, queue) in config.queues.iter_mut() {
            self.apply_queue_overrides(name, queue)?;
        }
        Ok(())
    }

    fn apply_logging_overrides(&self, config: &mut LoggingConfig) -> ConfigResult<()> {
        if let Some(level) = self.get_env_var("LOG_LEVEL") {
            config.level = LogLevel::from_str(&level).map_err(ConfigError::EnvError)?;
        }
        if let Some(format) = self.get_env_var("LOG_FORMAT") {
            config.format = LogFormat::from_str(&format).map_err(ConfigError::EnvError)?;
        }
        if let Some(filter) = self.get_env_var("LOG_FILTER") {
            config.filter = Some(filter);
        }
        Ok(())
    }

    fn apply_cluster_overrides(&self, config: &mut ClusterConfig) -> ConfigResult<()> {
        if let Some(origin) = self.get_env_var("CLUSTER_ORIGIN") {
            config.origin = Some(origin);
        }
        if let Some(interval) = self.get_env_var("CLUSTER_POLL_INTERVAL") {
            config.poll_interval = parse_duration("CLUSTER_POLL_INTERVAL", &interval)?;
        }
        Ok(())
    }

    fn apply_queue_overrides(&self, name: &str, config: &mut QueueConfig) -> ConfigResult<()> {
        let key = queue_env_key(name);

        let var = format!("QUEUE_{}_WORKER_COUNT", key);
        if let Some(value) = self.get_env_var(&var) {
            config.worker_count = value
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", var, e)))?;
        }

        let var = format!("QUEUE_{}_MAX_RETRIES", key);
        if let Some(value) = self.get_env_var(&var) {
            config.retry.max_retries = value
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", var, e)))?;
        }

        let var = format!("QUEUE_{}_MAX_TASK_EXECUTION", key);
        if let Some(value) = self.get_env_var(&var) {
            config.max_task_execution = parse_duration(&var, &value)?;
        }
        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Option<String> {
        std::env::var(format!("{}_{}", self.prefix, name)).ok()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn queue_env_key(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

fn parse_duration(var: &str, value: &str) -> ConfigResult<Duration> {
    humantime_serde::re::humantime::parse_duration(value)
        .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", var, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
queues:
  io-intense:
    worker_count: 2
    resume_task_types: [create_archive]
cluster:
  nodes:
    - id: 1
      name: slave-a
      server: http://10.0.0.5:5212
      capabilities: [create_archive]
logging:
  level: debug
"#;

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        temp_env::with_vars_unset(
            ["NIMBUS_LOG_LEVEL", "NIMBUS_QUEUE_IO_INTENSE_WORKER_COUNT"],
            || {
                let config = ConfigLoader::new().from_file(file.path()).unwrap();
                assert_eq!(config.queues["io-intense"].worker_count, 2);
                assert_eq!(config.logging.level, LogLevel::Debug);
                assert_eq!(config.cluster.nodes.len(), 1);
            },
        );
    }

    #[test]
    fn test_env_overrides() {
        temp_env::with_vars(
            [
                ("NIMBUS_LOG_LEVEL", Some("warn")),
                ("NIMBUS_LOG_FORMAT", Some("json")),
                ("NIMBUS_CLUSTER_POLL_INTERVAL", Some("45s")),
                ("NIMBUS_QUEUE_IO_INTENSE_WORKER_COUNT", Some("8")),
                ("NIMBUS_QUEUE_IO_INTENSE_MAX_TASK_EXECUTION", Some("1h")),
            ],
            || {
                let config = ConfigLoader::new().from_yaml(SAMPLE).unwrap();
                assert_eq!(config.logging.level, LogLevel::Warn);
                assert_eq!(config.logging.format, LogFormat::Json);
                assert_eq!(config.cluster.poll_interval, Duration::from_secs(45));
                assert_eq!(config.queues["io-intense"].worker_count, 8);
                assert_eq!(
                    config.queues["io-intense"].max_task_execution,
                    Duration::from_secs(3600)
                );
            },
        );
    }

    #[test]
    fn test_invalid_env_value() {
        temp_env::with_var("NIMBUS_QUEUE_IO_INTENSE_MAX_RETRIES", Some("many"), || {
            let err = ConfigLoader::new().from_yaml(SAMPLE).unwrap_err();
            assert!(matches!(err, ConfigError::EnvError(_)));
        });
    }

    #[test]
    fn test_validation_runs_after_overrides() {
        temp_env::with_var("NIMBUS_QUEUE_IO_INTENSE_WORKER_COUNT", Some("0"), || {
            let err = ConfigLoader::new().from_yaml(SAMPLE).unwrap_err();
            assert!(matches!(err, ConfigError::DomainError { .. }));
        });
    }

    #[test]
    fn test_custom_prefix_from_env() {
        temp_env::with_var("ACME_LOG_LEVEL", Some("trace"), || {
            let config = ConfigLoader::with_prefix("ACME").from_env().unwrap();
            assert_eq!(config.logging.level, LogLevel::Trace);
            assert!(config.queues.is_empty());
        });
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::new()
            .load(Some("/nonexistent/nimbus.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError(_)));
    }
}
