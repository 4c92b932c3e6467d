//! Domain-driven configuration for Nimbus
//!
//! Configuration is split by domain (queues, cluster, logging), loaded from
//! YAML with `NIMBUS_*` environment overrides, and validated per domain.

pub mod domains;
pub mod error;
pub mod loader;
pub mod validation;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    cluster::{ClusterConfig, NodeConfig},
    logging::{LogFormat, LogLevel, LoggingConfig},
    queue::QueueConfig,
    NimbusConfig,
};
