//! Cluster setup errors

use nimbus_config::ConfigError;
use nimbus_queue::QueueError;
use thiserror::Error;

/// Errors raised while assembling cluster components
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

pub type ClusterResult<T> = Result<T, ClusterError>;
