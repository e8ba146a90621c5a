//! Error types for building and loading routing snapshots.

use thiserror::Error;

/// Result type alias for routing operations.
pub type RoutingResult<T> = Result<T, RoutingError>;

/// Errors raised while constructing or querying routing state.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("invalid shard copy {shard}: {reason}")]
    InvalidShardState { shard: String, reason: String },

    #[error("shard {0} has more than one primary copy")]
    DuplicatePrimary(String),

    #[error("shard {0} has no primary copy")]
    MissingPrimary(String),

    #[error("shard {shard} references unknown node [{node}]")]
    UnknownNode { shard: String, node: String },

    #[error("{reason}")]
    UnresolvedNode { node: String, reason: String },

    #[error("failed to parse cluster state: {0}")]
    Parse(String),

    #[error("failed to read cluster state: {0}")]
    Io(String),
}
