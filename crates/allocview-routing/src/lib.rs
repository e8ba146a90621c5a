//! allocview-routing: the cluster routing model.
//!
//! Everything the explain pipeline reads about the cluster lives here:
//! shard copies and their lifecycle, the nodes they sit on, cluster-wide
//! blocks, disk usage, and the per-tenant routing tables.
//!
//! # Architecture
//!
//! A [`RoutingSnapshot`] is built once (from a [`ClusterStateDocument`] or
//! the [`RoutingSnapshotBuilder`]) and never mutated afterwards. It is
//! handed out as `Arc<RoutingSnapshot>` through the [`SnapshotHolder`], so
//! any number of readers can hold a snapshot while a newer one is
//! published.

pub mod blocks;
pub mod cluster_info;
pub mod document;
pub mod error;
pub mod holder;
pub mod nodes;
pub mod snapshot;
pub mod types;

pub use blocks::{BlockLevel, ClusterBlock, ClusterBlocks};
pub use cluster_info::{ClusterInfo, DiskUsage, SnapshotShardSizes};
pub use document::ClusterStateDocument;
pub use error::{RoutingError, RoutingResult};
pub use holder::{ClusterState, SnapshotHolder};
pub use nodes::{DiscoveryNode, DiscoveryNodes, NodeRole};
pub use snapshot::{IndexShardRoutingTable, RoutingSnapshot, RoutingSnapshotBuilder, RoutingTable};
pub use types::*;
