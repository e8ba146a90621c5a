//! Immutable point-in-time routing snapshot.
//!
//! Built once via [`RoutingSnapshotBuilder`], then shared read-only. The
//! builder checks that every node reference resolves and that every shard
//! has exactly one primary copy; queries on a built snapshot never fail.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::blocks::{ClusterBlock, ClusterBlocks};
use crate::error::{RoutingError, RoutingResult};
use crate::nodes::{DiscoveryNode, DiscoveryNodes};
use crate::types::{ShardId, ShardRouting, TenantId};

/// All copies of one shard: the primary plus replicas in stable order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexShardRoutingTable {
    shard_id: ShardId,
    primary: ShardRouting,
    replicas: Vec<ShardRouting>,
}

impl IndexShardRoutingTable {
    pub fn shard_id(&self) -> &ShardId {
        &self.shard_id
    }

    pub fn primary_shard(&self) -> &ShardRouting {
        &self.primary
    }

    pub fn replica_shards(&self) -> &[ShardRouting] {
        &self.replicas
    }

    /// Primary first, then replicas in list order.
    pub fn copies(&self) -> impl Iterator<Item = &ShardRouting> {
        std::iter::once(&self.primary).chain(self.replicas.iter())
    }
}

/// Routing table of one tenant: index name → shard number → copies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    indices: BTreeMap<String, BTreeMap<u32, IndexShardRoutingTable>>,
}

impl RoutingTable {
    pub fn shard_routing_table(&self, index: &str, shard: u32) -> Option<&IndexShardRoutingTable> {
        self.indices.get(index)?.get(&shard)
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.indices.contains_key(index)
    }

    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.indices.keys().map(String::as_str)
    }

    pub fn shard_tables(&self) -> impl Iterator<Item = &IndexShardRoutingTable> {
        self.indices.values().flat_map(|shards| shards.values())
    }
}

/// Read-only view of the cluster's routing state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingSnapshot {
    version: u64,
    cluster_name: String,
    nodes: DiscoveryNodes,
    blocks: ClusterBlocks,
    routing_tables: BTreeMap<TenantId, RoutingTable>,
    unassigned: Vec<ShardRouting>,
}

impl RoutingSnapshot {
    pub fn builder() -> RoutingSnapshotBuilder {
        RoutingSnapshotBuilder::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn nodes(&self) -> &DiscoveryNodes {
        &self.nodes
    }

    pub fn blocks(&self) -> &ClusterBlocks {
        &self.blocks
    }

    pub fn tenants(&self) -> impl Iterator<Item = &TenantId> {
        self.routing_tables.keys()
    }

    pub fn routing_table(&self, tenant: &TenantId) -> Option<&RoutingTable> {
        self.routing_tables.get(tenant)
    }

    pub fn shard_routing_table(
        &self,
        tenant: &TenantId,
        index: &str,
        shard: u32,
    ) -> Option<&IndexShardRoutingTable> {
        self.routing_tables.get(tenant)?.shard_routing_table(index, shard)
    }

    /// Unassigned copies, in the order fixed when the snapshot was built.
    pub fn unassigned(&self) -> &[ShardRouting] {
        &self.unassigned
    }

    /// Every copy of every shard across all tenants.
    pub fn all_copies(&self) -> impl Iterator<Item = &ShardRouting> {
        self.routing_tables
            .values()
            .flat_map(RoutingTable::shard_tables)
            .flat_map(IndexShardRoutingTable::copies)
    }

    /// Copies currently hosted by `node_id` (relocation sources included).
    pub fn copies_on_node<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a ShardRouting> + 'a {
        self.all_copies()
            .filter(move |c| c.current_node_id() == Some(node_id))
    }

    /// Recoveries targeting `node_id`: initializing copies on it plus
    /// copies relocating onto it.
    pub fn incoming_recoveries(&self, node_id: &str) -> usize {
        self.all_copies()
            .filter(|c| {
                (c.initializing() && c.current_node_id() == Some(node_id))
                    || c.relocating_node_id() == Some(node_id)
            })
            .count()
    }
}

/// Collects nodes, blocks, and shard copies, then validates them into a
/// [`RoutingSnapshot`].
#[derive(Debug, Default)]
pub struct RoutingSnapshotBuilder {
    version: u64,
    cluster_name: String,
    nodes: Vec<DiscoveryNode>,
    blocks: Vec<ClusterBlock>,
    tenants: BTreeSet<TenantId>,
    copies: Vec<ShardRouting>,
}

impl RoutingSnapshotBuilder {
    pub fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = name.into();
        self
    }

    pub fn node(mut self, node: DiscoveryNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn block(mut self, block: ClusterBlock) -> Self {
        self.blocks.push(block);
        self
    }

    /// Register a tenant even if it owns no shards.
    pub fn tenant(mut self, tenant: TenantId) -> Self {
        self.tenants.insert(tenant);
        self
    }

    /// Add one shard copy. Replica order and unassigned-pool order follow
    /// insertion order.
    pub fn shard(mut self, copy: ShardRouting) -> Self {
        self.copies.push(copy);
        self
    }

    pub fn shards(mut self, copies: impl IntoIterator<Item = ShardRouting>) -> Self {
        self.copies.extend(copies);
        self
    }

    pub fn build(self) -> RoutingResult<RoutingSnapshot> {
        let nodes = DiscoveryNodes::new(self.nodes);

        for copy in &self.copies {
            for node in copy.current_node_id().into_iter().chain(copy.relocating_node_id()) {
                if !nodes.contains(node) {
                    return Err(RoutingError::UnknownNode {
                        shard: copy.shard_id().to_string(),
                        node: node.to_string(),
                    });
                }
            }
        }

        let mut grouped: BTreeMap<(TenantId, ShardId), (Option<ShardRouting>, Vec<ShardRouting>)> =
            BTreeMap::new();
        for copy in &self.copies {
            let slot = grouped
                .entry((copy.tenant_id().clone(), copy.shard_id().clone()))
                .or_default();
            if copy.primary() {
                if slot.0.is_some() {
                    return Err(RoutingError::DuplicatePrimary(copy.shard_id().to_string()));
                }
                slot.0 = Some(copy.clone());
            } else {
                slot.1.push(copy.clone());
            }
        }

        let mut routing_tables: BTreeMap<TenantId, RoutingTable> = self
            .tenants
            .into_iter()
            .map(|t| (t, RoutingTable::default()))
            .collect();
        for ((tenant, shard_id), (primary, replicas)) in grouped {
            let primary = primary.ok_or_else(|| RoutingError::MissingPrimary(shard_id.to_string()))?;
            routing_tables
                .entry(tenant)
                .or_default()
                .indices
                .entry(shard_id.index.clone())
                .or_default()
                .insert(
                    shard_id.shard,
                    IndexShardRoutingTable {
                        shard_id,
                        primary,
                        replicas,
                    },
                );
        }

        let unassigned: Vec<ShardRouting> = self
            .copies
            .into_iter()
            .filter(ShardRouting::unassigned)
            .collect();

        debug!(
            version = self.version,
            nodes = nodes.len(),
            tenants = routing_tables.len(),
            unassigned = unassigned.len(),
            "routing snapshot built"
        );

        Ok(RoutingSnapshot {
            version: self.version,
            cluster_name: self.cluster_name,
            nodes,
            blocks: ClusterBlocks::new(self.blocks),
            routing_tables,
            unassigned,
        })
    }
}
