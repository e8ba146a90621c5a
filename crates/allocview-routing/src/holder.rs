//! Publication point for the current cluster state.
//!
//! Publishing swaps in a whole new [`ClusterState`]; readers that already
//! cloned the previous one keep using it untouched.

use std::sync::{Arc, RwLock};

use tracing::info;

use crate::cluster_info::{ClusterInfo, SnapshotShardSizes};
use crate::snapshot::RoutingSnapshot;

/// A routing snapshot together with the side information gathered for it.
#[derive(Debug, Clone)]
pub struct ClusterState {
    snapshot: Arc<RoutingSnapshot>,
    cluster_info: Arc<ClusterInfo>,
    snapshot_shard_sizes: Arc<SnapshotShardSizes>,
}

impl ClusterState {
    pub fn new(
        snapshot: RoutingSnapshot,
        cluster_info: ClusterInfo,
        snapshot_shard_sizes: SnapshotShardSizes,
    ) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            cluster_info: Arc::new(cluster_info),
            snapshot_shard_sizes: Arc::new(snapshot_shard_sizes),
        }
    }

    pub fn snapshot(&self) -> &Arc<RoutingSnapshot> {
        &self.snapshot
    }

    pub fn cluster_info(&self) -> &Arc<ClusterInfo> {
        &self.cluster_info
    }

    pub fn snapshot_shard_sizes(&self) -> &Arc<SnapshotShardSizes> {
        &self.snapshot_shard_sizes
    }
}

/// Shared handle to the most recently published [`ClusterState`].
///
/// `Clone` + `Send` + `Sync`; every clone observes the same publications.
#[derive(Debug, Clone)]
pub struct SnapshotHolder {
    current: Arc<RwLock<ClusterState>>,
}

impl SnapshotHolder {
    pub fn new(initial: ClusterState) -> Self {
        Self {
            current: Arc::new(RwLock::new(initial)),
        }
    }

    /// Cheap clone of the current state (three `Arc` bumps).
    pub fn current(&self) -> ClusterState {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the current state. Returns the version that was replaced.
    pub fn publish(&self, next: ClusterState) -> u64 {
        let version = next.snapshot().version();
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = std::mem::replace(&mut *guard, next);
        info!(
            previous = previous.snapshot().version(),
            version, "published cluster state"
        );
        previous.snapshot().version()
    }
}
