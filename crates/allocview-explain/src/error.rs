//! Explain error types.

use thiserror::Error;

use allocview_routing::RoutingError;

/// Errors that fail an explain request. None of them are retried.
#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("blocked by: [{id}/{description}]")]
    ClusterBlocked { id: u32, description: String },

    #[error("an explain request for a named index must target exactly one tenant, found [{count}]")]
    AmbiguousTenantScope { count: usize },

    #[error(
        "there are no unassigned shards in this cluster; specify an assigned shard in the request body to explain its allocation"
    )]
    NoUnassignedShards,

    #[error("no such shard [{index}][{shard}]")]
    ShardNotFound { index: String, shard: u32 },

    #[error("unable to find primary shard assigned to node [{node}]")]
    NodeMismatch { node: String },

    #[error("unable to find a replica shard assigned to node [{node}]")]
    ReplicaNotFoundOnNode { node: String },

    #[error("unable to find any shards to explain [{request}] in the routing table")]
    NoShardsToExplain { request: String },

    #[error("{reason}")]
    UnresolvedNode { node: String, reason: String },

    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("explain unavailable: {0}")]
    Unavailable(String),
}

impl ExplainError {
    /// Stable snake_case name used in error responses.
    pub fn error_type(&self) -> &'static str {
        match self {
            ExplainError::ClusterBlocked { .. } => "cluster_block_exception",
            ExplainError::AmbiguousTenantScope { .. } => "ambiguous_tenant_scope",
            ExplainError::NoUnassignedShards => "no_unassigned_shards",
            ExplainError::ShardNotFound { .. } => "shard_not_found_exception",
            ExplainError::NodeMismatch { .. } => "node_mismatch",
            ExplainError::ReplicaNotFoundOnNode { .. } => "replica_not_found_on_node",
            ExplainError::NoShardsToExplain { .. } => "no_shards_to_explain",
            ExplainError::UnresolvedNode { .. } => "unresolved_node",
            ExplainError::Validation(_) => "action_request_validation_exception",
            ExplainError::Unavailable(_) => "unavailable",
        }
    }
}

impl From<RoutingError> for ExplainError {
    fn from(err: RoutingError) -> Self {
        match err {
            RoutingError::UnresolvedNode { node, reason } => ExplainError::UnresolvedNode { node, reason },
            other => ExplainError::Unavailable(other.to_string()),
        }
    }
}

pub type ExplainResult<T> = Result<T, ExplainError>;
