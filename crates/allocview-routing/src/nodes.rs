//! Cluster nodes and node-name resolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{RoutingError, RoutingResult};
use crate::types::NodeId;

/// Role a node plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Master,
    Data,
    Ingest,
}

/// A node as seen in the routing snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryNode {
    pub id: NodeId,
    pub name: String,
    /// Transport address (host:port).
    pub address: String,
    #[serde(default = "default_roles")]
    pub roles: Vec<NodeRole>,
    pub version: semver::Version,
    /// Arbitrary attributes (zone, rack, ...).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

fn default_roles() -> Vec<NodeRole> {
    vec![NodeRole::Master, NodeRole::Data]
}

impl DiscoveryNode {
    pub fn can_contain_data(&self) -> bool {
        self.roles.contains(&NodeRole::Data)
    }
}

/// The node table of a snapshot, keyed and iterated by node id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryNodes {
    nodes: BTreeMap<NodeId, DiscoveryNode>,
}

impl DiscoveryNodes {
    pub fn new(nodes: impl IntoIterator<Item = DiscoveryNode>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
        }
    }

    pub fn get(&self, node_id: &str) -> Option<&DiscoveryNode> {
        self.nodes.get(node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiscoveryNode> {
        self.nodes.values()
    }

    pub fn data_nodes(&self) -> impl Iterator<Item = &DiscoveryNode> {
        self.nodes.values().filter(|n| n.can_contain_data())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolve a node given by id, name, or transport address.
    ///
    /// An exact id match wins. Otherwise the name/address matches must
    /// identify exactly one node.
    pub fn resolve_node(&self, node: &str) -> RoutingResult<&DiscoveryNode> {
        if let Some(found) = self.nodes.get(node) {
            return Ok(found);
        }

        let mut matches = self
            .nodes
            .values()
            .filter(|n| n.name == node || n.address == node);
        match (matches.next(), matches.next()) {
            (Some(found), None) => Ok(found),
            (None, _) => Err(RoutingError::UnresolvedNode {
                node: node.to_string(),
                reason: format!("failed to resolve [{node}], no matching nodes"),
            }),
            (Some(_), Some(_)) => {
                let count = 2 + matches.count();
                Err(RoutingError::UnresolvedNode {
                    node: node.to_string(),
                    reason: format!(
                        "resolved [{node}] into [{count}] nodes, where expected to be resolved to a single node"
                    ),
                })
            }
        }
    }
}
