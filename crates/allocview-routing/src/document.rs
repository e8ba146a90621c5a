//! JSON cluster-state document.
//!
//! The on-disk form the daemon loads snapshots from. Parsing is lenient
//! about optional sections; building the snapshot is strict about the
//! shard invariants.
//!
//! ```json
//! {
//!   "cluster_name": "prod",
//!   "version": 12,
//!   "nodes": [{ "id": "n1", "name": "alpha", "address": "10.0.0.1:9300", "version": "8.1.0" }],
//!   "indices": [{
//!     "name": "logs", "tenant": "default",
//!     "shards": [{ "shard": 0, "copies": [{ "primary": true, "state": "STARTED", "node": "n1" }] }]
//!   }]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::blocks::ClusterBlock;
use crate::cluster_info::{ClusterInfo, SnapshotShardSizes};
use crate::error::{RoutingError, RoutingResult};
use crate::holder::ClusterState;
use crate::nodes::DiscoveryNode;
use crate::snapshot::RoutingSnapshot;
use crate::types::{NodeId, ShardId, ShardRouting, ShardState, TenantId, UnassignedInfo};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterStateDocument {
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub nodes: Vec<DiscoveryNode>,
    #[serde(default)]
    pub blocks: Vec<ClusterBlock>,
    /// Tenants that exist even when they own no index.
    #[serde(default)]
    pub tenants: Vec<TenantId>,
    #[serde(default)]
    pub indices: Vec<IndexDocument>,
    #[serde(default)]
    pub cluster_info: ClusterInfo,
    #[serde(default)]
    pub snapshot_shard_sizes: Vec<SnapshotShardSize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocument {
    pub name: String,
    #[serde(default = "default_tenant")]
    pub tenant: TenantId,
    pub shards: Vec<ShardDocument>,
}

fn default_tenant() -> TenantId {
    TenantId::new("default")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardDocument {
    pub shard: u32,
    pub copies: Vec<ShardCopyDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardCopyDocument {
    pub primary: bool,
    pub state: ShardState,
    #[serde(default)]
    pub node: Option<NodeId>,
    #[serde(default)]
    pub relocating_node: Option<NodeId>,
    #[serde(default)]
    pub unassigned_info: Option<UnassignedInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotShardSize {
    #[serde(default = "default_tenant")]
    pub tenant: TenantId,
    pub index: String,
    pub shard: u32,
    pub size_bytes: u64,
}

impl ClusterStateDocument {
    pub fn from_json(json: &str) -> RoutingResult<Self> {
        serde_json::from_str(json).map_err(|e| RoutingError::Parse(e.to_string()))
    }

    pub fn from_file(path: &Path) -> RoutingResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RoutingError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    /// Validate the document and build the snapshot plus side information.
    pub fn into_cluster_state(self) -> RoutingResult<ClusterState> {
        let mut builder = RoutingSnapshot::builder()
            .version(self.version)
            .cluster_name(self.cluster_name);
        for node in self.nodes {
            builder = builder.node(node);
        }
        for block in self.blocks {
            builder = builder.block(block);
        }
        for tenant in self.tenants {
            builder = builder.tenant(tenant);
        }
        for index in self.indices {
            builder = builder.tenant(index.tenant.clone());
            for shard in index.shards {
                for copy in shard.copies {
                    let shard_id = ShardId::new(index.name.clone(), shard.shard);
                    let routing = ShardRouting::new(
                        index.tenant.clone(),
                        shard_id,
                        copy.primary,
                        copy.state,
                        copy.node,
                        copy.relocating_node,
                    )?;
                    let routing = match copy.unassigned_info {
                        Some(info) => routing.with_unassigned_info(info),
                        None => routing,
                    };
                    builder = builder.shard(routing);
                }
            }
        }

        let sizes: BTreeMap<(TenantId, ShardId), u64> = self
            .snapshot_shard_sizes
            .into_iter()
            .map(|s| ((s.tenant, ShardId::new(s.index, s.shard)), s.size_bytes))
            .collect();

        Ok(ClusterState::new(
            builder.build()?,
            self.cluster_info,
            SnapshotShardSizes::new(sizes),
        ))
    }
}
