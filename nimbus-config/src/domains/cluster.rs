//! Cluster node configuration

use nimbus_core::NodeId;
use nimbus_interfaces::NodeCapability;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, validate_url, Validatable};

/// Cluster configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Identifier this node sends as the origin of delegated tasks
    pub origin: Option<String>,

    /// Nodes that can run delegated sub-tasks
    pub nodes: Vec<NodeConfig>,

    /// Interval between polls of a remote task
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Timeout of a single node RPC
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// How long a slave keeps finished tasks queryable
    #[serde(with = "humantime_serde")]
    pub slave_retention: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            origin: None,
            nodes: Vec::new(),
            poll_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            slave_retention: Duration::from_secs(60 * 60),
        }
    }
}

/// A single cluster node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: NodeId,
    pub name: String,
    /// Base URL of the node API
    pub server: String,
    #[serde(default)]
    pub capabilities: Vec<NodeCapability>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl NodeConfig {
    pub fn base_url(&self) -> ConfigResult<Url> {
        Ok(Url::parse(&self.server)?)
    }
}

impl Validatable for ClusterConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.poll_interval.is_zero() {
            return Err(self.validation_error("poll_interval must be greater than 0"));
        }
        if self.request_timeout.is_zero() {
            return Err(self.validation_error("request_timeout must be greater than 0"));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            node.validate()?;
            if !seen.insert(node.id) {
                return Err(self.validation_error(format!("duplicate node id {}", node.id)));
            }
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "cluster"
    }
}

impl Validatable for NodeConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.name, "name", self.domain_name())?;
        validate_url(&self.server, "server", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "cluster.node"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: NodeId) -> NodeConfig {
        NodeConfig {
            id,
            name: format!("slave-{}", id),
            server: "http://127.0.0.1:5212".to_string(),
            capabilities: vec![NodeCapability::CreateArchive],
            enabled: true,
        }
    }

    #[test]
    fn test_parse_nodes() {
        let yaml = r#"
origin: master-1
poll_interval: 5s
nodes:
  - id: 2
    name: slave-a
    server: http://10.0.0.2:5212
    capabilities: [create_archive, media_meta]
"#;
        let config: ClusterConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.origin.as_deref(), Some("master-1"));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.nodes[0].capabilities.len(), 2);
        assert!(config.nodes[0].enabled);
        assert_eq!(config.nodes[0].base_url().unwrap().port(), Some(5212));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_node_ids_rejected() {
        let config = ClusterConfig {
            nodes: vec![node(1), node(1)],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_server_rejected() {
        let mut bad = node(3);
        bad.server = "localhost".to_string();
        assert!(bad.validate().is_err());
    }
}
