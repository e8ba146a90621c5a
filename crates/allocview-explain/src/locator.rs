//! Shard locator: picks exactly one shard copy to explain.
//!
//! Two addressing modes:
//! 1. **Any unassigned**: walk the unassigned pool in snapshot order,
//!    skipping copies outside the tenant scope. The first eligible primary
//!    wins immediately; otherwise the first eligible copy seen.
//! 2. **Specific**: a single tenant, an index, a shard number, a
//!    primary/replica flag and optionally a node. Replicas without a node
//!    filter go through [`replica_preference`].
//!
//! For a fixed snapshot and target the result is always the same copy.

use std::fmt;

use tracing::debug;

use allocview_routing::{RoutingSnapshot, ShardRouting, TenantScope};

use crate::error::{ExplainError, ExplainResult};

/// Addressing mode of a validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardTarget {
    AnyUnassigned,
    Specific {
        index: String,
        shard: u32,
        primary: bool,
        current_node: Option<String>,
    },
}

impl ShardTarget {
    pub fn is_specific(&self) -> bool {
        matches!(self, ShardTarget::Specific { .. })
    }
}

impl fmt::Display for ShardTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardTarget::AnyUnassigned => f.write_str("any unassigned shard"),
            ShardTarget::Specific {
                index,
                shard,
                primary,
                current_node,
            } => {
                write!(f, "[{index}][{shard}], primary [{primary}]")?;
                if let Some(node) = current_node {
                    write!(f, ", node [{node}]")?;
                }
                Ok(())
            }
        }
    }
}

/// What a replica does to the current candidate during the replica scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaPreference {
    /// The replica is the result; stop scanning.
    Stop,
    /// The replica becomes the new candidate; keep scanning.
    Replace,
    /// The candidate stays.
    Keep,
}

/// Priority rule for replicas: an unassigned replica ends the search, and a
/// started replica displaces an initializing or relocating candidate.
pub fn replica_preference(candidate: &ShardRouting, replica: &ShardRouting) -> ReplicaPreference {
    if replica.unassigned() {
        ReplicaPreference::Stop
    } else if replica.started() && candidate.in_transition() {
        ReplicaPreference::Replace
    } else {
        ReplicaPreference::Keep
    }
}

/// Select the copy to explain.
pub fn locate(target: &ShardTarget, scope: &TenantScope, snapshot: &RoutingSnapshot) -> ExplainResult<ShardRouting> {
    let found = match target {
        ShardTarget::AnyUnassigned => {
            let found = first_unassigned(snapshot.unassigned(), scope).ok_or(ExplainError::NoUnassignedShards)?;
            Some(found)
        }
        ShardTarget::Specific {
            index,
            shard,
            primary,
            current_node,
        } => locate_specific(index, *shard, *primary, current_node.as_deref(), scope, snapshot)?,
    };

    let found = found.ok_or_else(|| ExplainError::NoShardsToExplain {
        request: target.to_string(),
    })?;
    debug!(%target, shard = %found, "located shard");
    Ok(found.clone())
}

/// First primary in scope, or failing that the first copy in scope.
fn first_unassigned<'a>(pool: &'a [ShardRouting], scope: &TenantScope) -> Option<&'a ShardRouting> {
    let mut candidate = None;
    for copy in pool.iter().filter(|c| scope.contains(c.tenant_id())) {
        if copy.primary() {
            return Some(copy);
        }
        candidate.get_or_insert(copy);
    }
    candidate
}

fn locate_specific<'a>(
    index: &str,
    shard: u32,
    primary: bool,
    current_node: Option<&str>,
    scope: &TenantScope,
    snapshot: &'a RoutingSnapshot,
) -> ExplainResult<Option<&'a ShardRouting>> {
    let tenant = match scope.iter().next() {
        Some(tenant) if scope.len() == 1 => tenant,
        _ => return Err(ExplainError::AmbiguousTenantScope { count: scope.len() }),
    };

    let table = snapshot
        .shard_routing_table(tenant, index, shard)
        .ok_or_else(|| ExplainError::ShardNotFound {
            index: index.to_string(),
            shard,
        })?;

    if primary {
        let found = table.primary_shard();
        if let Some(node) = current_node {
            let resolved = snapshot.nodes().resolve_node(node)?;
            if found.current_node_id() != Some(resolved.id.as_str()) {
                return Err(ExplainError::NodeMismatch { node: node.to_string() });
            }
        }
        return Ok(Some(found));
    }

    let replicas = table.replica_shards();
    match current_node {
        Some(node) => {
            let resolved = snapshot.nodes().resolve_node(node)?;
            replicas
                .iter()
                .find(|r| r.current_node_id() == Some(resolved.id.as_str()))
                .map(Some)
                .ok_or_else(|| ExplainError::ReplicaNotFoundOnNode { node: node.to_string() })
        }
        None => Ok(preferred_replica(replicas)),
    }
}

fn preferred_replica(replicas: &[ShardRouting]) -> Option<&ShardRouting> {
    let mut candidate = replicas.first()?;
    for replica in replicas {
        match replica_preference(candidate, replica) {
            ReplicaPreference::Stop => return Some(replica),
            ReplicaPreference::Replace => candidate = replica,
            ReplicaPreference::Keep => {}
        }
    }
    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use allocview_routing::{ShardId, TenantId, UnassignedInfo, UnassignedReason};

    fn tenant() -> TenantId {
        TenantId::new("t")
    }

    fn copy(state: &str, node: &str) -> ShardRouting {
        let id = ShardId::new("logs", 0);
        match state {
            "U" => ShardRouting::new_unassigned(
                tenant(),
                id,
                false,
                UnassignedInfo::new(UnassignedReason::ReplicaAdded, 0),
            ),
            "I" => ShardRouting::new_initializing(tenant(), id, false, node),
            "S" => ShardRouting::new_started(tenant(), id, false, node),
            _ => ShardRouting::new_relocating(tenant(), id, false, node, "elsewhere"),
        }
    }

    #[test]
    fn unassigned_replica_always_stops() {
        for candidate in ["U", "I", "S", "R"] {
            assert_eq!(
                replica_preference(&copy(candidate, "a"), &copy("U", "")),
                ReplicaPreference::Stop
            );
        }
    }

    #[test]
    fn started_replaces_only_transitional_candidates() {
        assert_eq!(
            replica_preference(&copy("I", "a"), &copy("S", "b")),
            ReplicaPreference::Replace
        );
        assert_eq!(
            replica_preference(&copy("R", "a"), &copy("S", "b")),
            ReplicaPreference::Replace
        );
        assert_eq!(
            replica_preference(&copy("S", "a"), &copy("S", "b")),
            ReplicaPreference::Keep
        );
    }

    #[test]
    fn transitional_replicas_never_change_candidate() {
        for replica in ["I", "R"] {
            for candidate in ["I", "S", "R"] {
                assert_eq!(
                    replica_preference(&copy(candidate, "a"), &copy(replica, "b")),
                    ReplicaPreference::Keep
                );
            }
        }
    }

    #[test]
    fn preferred_replica_of_empty_list_is_none() {
        assert!(preferred_replica(&[]).is_none());
    }

    #[test]
    fn preferred_replica_keeps_first_started() {
        let replicas = vec![copy("I", "a"), copy("S", "b"), copy("S", "c")];
        assert_eq!(preferred_replica(&replicas).unwrap().current_node_id(), Some("b"));
    }

    #[test]
    fn first_unassigned_skips_out_of_scope_primary() {
        let other = TenantId::new("other");
        let pool = vec![
            ShardRouting::new_unassigned(
                other,
                ShardId::new("a", 0),
                true,
                UnassignedInfo::new(UnassignedReason::IndexCreated, 0),
            ),
            copy("U", ""),
        ];
        let scope: TenantScope = [tenant()].into_iter().collect();
        let found = first_unassigned(&pool, &scope).unwrap();
        assert_eq!(found.tenant_id(), &tenant());
        assert!(!found.primary());
    }

    #[test]
    fn target_display() {
        let target = ShardTarget::Specific {
            index: "logs".to_string(),
            shard: 3,
            primary: false,
            current_node: Some("n1".to_string()),
        };
        assert_eq!(target.to_string(), "[logs][3], primary [false], node [n1]");
        assert!(!ShardTarget::AnyUnassigned.is_specific());
    }
}
