//! Pool of cluster nodes available for delegation

use nimbus_config::ClusterConfig;
use nimbus_core::NodeId;
use nimbus_interfaces::{NodeCapability, NodeClient, NodeError, NodeResult};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::HttpNodeClient;
use crate::error::ClusterResult;

/// A node that can run delegated sub-tasks
pub struct ClusterNode {
    id: NodeId,
    name: String,
    capabilities: BTreeSet<NodeCapability>,
    client: Arc<dyn NodeClient>,
}

impl ClusterNode {
    pub fn new(
        id: NodeId,
        name: impl Into<String>,
        capabilities: impl IntoIterator<Item = NodeCapability>,
        client: Arc<dyn NodeClient>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            capabilities: capabilities.into_iter().collect(),
            client,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supports(&self, capability: NodeCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn client(&self) -> &Arc<dyn NodeClient> {
        &self.client
    }
}

impl fmt::Debug for ClusterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Round-robin allocation among nodes advertising a capability
#[derive(Debug, Default)]
pub struct NodePool {
    nodes: Vec<Arc<ClusterNode>>,
    cursor: AtomicUsize,
}

impl NodePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool of HTTP clients for the enabled nodes of a cluster
    pub fn from_config(config: &ClusterConfig) -> ClusterResult<Self> {
        let mut pool = Self::new();
        for node in config.nodes.iter().filter(|node| node.enabled) {
            let client = HttpNodeClient::new(node.base_url()?, config.request_timeout)?;
            pool = pool.with_node(ClusterNode::new(
                node.id,
                node.name.clone(),
                node.capabilities.iter().copied(),
                Arc::new(client),
            ));
        }
        info!(nodes = pool.len(), "Node pool ready");
        Ok(pool)
    }

    /// Add a node, replacing any node with the same ID
    pub fn with_node(mut self, node: ClusterNode) -> Self {
        self.nodes.retain(|existing| existing.id != node.id);
        self.nodes.push(Arc::new(node));
        self
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> NodeResult<Arc<ClusterNode>> {
        self.nodes
            .iter()
            .find(|node| node.id == id)
            .cloned()
            .ok_or(NodeError::UnknownNode(id))
    }

    /// Pick a node for `capability`
    ///
    /// A `preferred` node that is still in the pool and still capable is
    /// returned as-is, so a resumed task keeps talking to the same node.
    pub fn allocate(
        &self,
        capability: NodeCapability,
        preferred: Option<NodeId>,
    ) -> NodeResult<Arc<ClusterNode>> {
        if let Some(id) = preferred {
            if let Some(node) = self.nodes.iter().find(|node| node.id == id) {
                if node.supports(capability) {
                    return Ok(Arc::clone(node));
                }
            }
            debug!(node_id = id, %capability, "Preferred node no longer usable");
        }

        let capable: Vec<&Arc<ClusterNode>> = self
            .nodes
            .iter()
            .filter(|node| node.supports(capability))
            .collect();
        if capable.is_empty() {
            return Err(NodeError::NoCapableNode(capability));
        }

        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % capable.len();
        Ok(Arc::clone(capable[index]))
    }
}
