//! Per-request allocation context.
//!
//! [`AllocationInputs`] gathers what the request read from its
//! collaborators. Turning it into an [`AllocationContext`] fixes the debug
//! mode; the context has no setters and is owned by one request.

use std::sync::Arc;
use std::time::Instant;

use allocview_routing::{ClusterInfo, DiscoveryNodes, RoutingSnapshot, SnapshotShardSizes};

use crate::decision::Decision;

/// How much of the per-decider reasoning the decision trace keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugMode {
    /// Outcomes only.
    Off,
    /// Every reason, including affirmative ones.
    On,
    /// Every reason except affirmative ones.
    ExcludeYes,
}

impl DebugMode {
    pub fn for_request(include_yes_decisions: bool) -> Self {
        if include_yes_decisions {
            DebugMode::On
        } else {
            DebugMode::ExcludeYes
        }
    }

    /// Whether a reason with this outcome belongs in the trace.
    pub fn records(&self, decision: Decision) -> bool {
        match self {
            DebugMode::Off => false,
            DebugMode::On => true,
            DebugMode::ExcludeYes => decision != Decision::Yes,
        }
    }
}

/// Collaborator data read for one request, before the debug mode is known.
#[derive(Debug, Clone)]
pub struct AllocationInputs {
    snapshot: Arc<RoutingSnapshot>,
    cluster_info: Arc<ClusterInfo>,
    snapshot_shard_sizes: Arc<SnapshotShardSizes>,
    timestamp: Instant,
}

impl AllocationInputs {
    pub fn new(
        snapshot: Arc<RoutingSnapshot>,
        cluster_info: Arc<ClusterInfo>,
        snapshot_shard_sizes: Arc<SnapshotShardSizes>,
        timestamp: Instant,
    ) -> Self {
        Self {
            snapshot,
            cluster_info,
            snapshot_shard_sizes,
            timestamp,
        }
    }

    pub fn snapshot(&self) -> &RoutingSnapshot {
        &self.snapshot
    }

    pub fn cluster_info(&self) -> &Arc<ClusterInfo> {
        &self.cluster_info
    }

    pub fn with_debug_mode(self, debug_mode: DebugMode) -> AllocationContext {
        AllocationContext {
            snapshot: self.snapshot,
            cluster_info: self.cluster_info,
            snapshot_shard_sizes: self.snapshot_shard_sizes,
            timestamp: self.timestamp,
            debug_mode,
        }
    }
}

/// Everything a decision engine may read while evaluating one shard.
#[derive(Debug)]
pub struct AllocationContext {
    snapshot: Arc<RoutingSnapshot>,
    cluster_info: Arc<ClusterInfo>,
    snapshot_shard_sizes: Arc<SnapshotShardSizes>,
    timestamp: Instant,
    debug_mode: DebugMode,
}

impl AllocationContext {
    pub fn snapshot(&self) -> &RoutingSnapshot {
        &self.snapshot
    }

    pub fn nodes(&self) -> &DiscoveryNodes {
        self.snapshot.nodes()
    }

    pub fn cluster_info(&self) -> &ClusterInfo {
        &self.cluster_info
    }

    pub fn snapshot_shard_sizes(&self) -> &SnapshotShardSizes {
        &self.snapshot_shard_sizes
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    pub fn debug_mode(&self) -> DebugMode {
        self.debug_mode
    }
}
