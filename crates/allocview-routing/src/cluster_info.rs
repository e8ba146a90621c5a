//! Disk usage and shard size information gathered outside the routing table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{NodeId, ShardId, ShardRouting, TenantId};

/// Disk usage of the data path on a single node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl DiskUsage {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }

    /// Used fraction in `0.0..=1.0`. A zero-sized disk counts as full.
    pub fn used_fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        self.used_bytes() as f64 / self.total_bytes as f64
    }
}

/// Point-in-time disk usage per node plus known shard sizes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    #[serde(default)]
    pub disk_usages: BTreeMap<NodeId, DiskUsage>,
    /// Per tenant, keyed by [`ShardRouting::size_key`]. Index names are
    /// only unique within a tenant.
    #[serde(default)]
    pub shard_sizes: BTreeMap<TenantId, BTreeMap<String, u64>>,
}

impl ClusterInfo {
    pub fn disk_usage(&self, node_id: &str) -> Option<&DiskUsage> {
        self.disk_usages.get(node_id)
    }

    pub fn shard_size(&self, shard: &ShardRouting) -> Option<u64> {
        self.shard_sizes
            .get(shard.tenant_id())
            .and_then(|sizes| sizes.get(&shard.size_key()))
            .copied()
    }
}

/// Expected sizes of shards being restored from a snapshot, per tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotShardSizes {
    sizes: BTreeMap<(TenantId, ShardId), u64>,
}

impl SnapshotShardSizes {
    pub fn new(sizes: BTreeMap<(TenantId, ShardId), u64>) -> Self {
        Self { sizes }
    }

    pub fn size(&self, tenant: &TenantId, shard_id: &ShardId) -> Option<u64> {
        self.sizes.get(&(tenant.clone(), shard_id.clone())).copied()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn used_fraction() {
        let usage = DiskUsage {
            total_bytes: 100,
            free_bytes: 25,
        };
        assert_eq!(usage.used_bytes(), 75);
        assert!((usage.used_fraction() - 0.75).abs() < f64::EPSILON);

        let empty = DiskUsage {
            total_bytes: 0,
            free_bytes: 0,
        };
        assert_eq!(empty.used_fraction(), 1.0);
    }

    #[test]
    fn shard_size_lookup_uses_tenant_and_size_key() {
        let copy = ShardRouting::new_started(TenantId::new("t"), ShardId::new("logs", 0), true, "n1");
        let other = ShardRouting::new_started(TenantId::new("u"), ShardId::new("logs", 0), true, "n2");
        let mut info = ClusterInfo::default();
        info.shard_sizes
            .entry(TenantId::new("t"))
            .or_default()
            .insert("[logs][0][p]".to_string(), 4096);
        assert_eq!(info.shard_size(&copy), Some(4096));
        assert_eq!(info.shard_size(&other), None);
    }

    #[test]
    fn snapshot_sizes_are_per_tenant() {
        let sizes = SnapshotShardSizes::new(
            [((TenantId::new("t"), ShardId::new("logs", 0)), 450)]
                .into_iter()
                .collect(),
        );
        assert_eq!(sizes.size(&TenantId::new("t"), &ShardId::new("logs", 0)), Some(450));
        assert_eq!(sizes.size(&TenantId::new("u"), &ShardId::new("logs", 0)), None);
    }
}
