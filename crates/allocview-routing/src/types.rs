//! Shard identity, lifecycle, and tenant types.
//!
//! A [`ShardRouting`] is one physical copy of a shard. Its fields are
//! private so that the node references always agree with the lifecycle
//! state: an unassigned copy has no current node, and only a relocating
//! copy has a relocation target.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RoutingError, RoutingResult};

/// Unique identifier for a node in the cluster.
pub type NodeId = String;

// ── Tenant ────────────────────────────────────────────────────────

/// Isolation boundary grouping indices and their shards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tenants a requester is allowed to see. Ordered so iteration is stable.
pub type TenantScope = BTreeSet<TenantId>;

// ── Shard identity ────────────────────────────────────────────────

/// A logical shard: (index name, shard number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId {
    pub index: String,
    pub shard: u32,
}

impl ShardId {
    pub fn new(index: impl Into<String>, shard: u32) -> Self {
        Self {
            index: index.into(),
            shard,
        }
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}]", self.index, self.shard)
    }
}

/// Lifecycle state of a shard copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShardState {
    Unassigned,
    Initializing,
    Started,
    Relocating,
}

impl ShardState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShardState::Unassigned => "unassigned",
            ShardState::Initializing => "initializing",
            ShardState::Started => "started",
            ShardState::Relocating => "relocating",
        }
    }
}

impl fmt::Display for ShardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Unassigned info ───────────────────────────────────────────────

/// Why a copy became unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnassignedReason {
    IndexCreated,
    ClusterRecovered,
    IndexReopened,
    NewIndexRestored,
    ExistingIndexRestored,
    ReplicaAdded,
    AllocationFailed,
    NodeLeft,
    RerouteCancelled,
    Reinitialized,
    PrimaryFailed,
    ManualAllocation,
    IndexClosed,
    NodeRestarting,
}

/// Details recorded when a copy became unassigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnassignedInfo {
    pub reason: UnassignedReason,
    /// Unix timestamp (milliseconds) when the copy became unassigned.
    pub at_millis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default)]
    pub failed_allocations: u32,
}

impl UnassignedInfo {
    pub fn new(reason: UnassignedReason, at_millis: u64) -> Self {
        Self {
            reason,
            at_millis,
            details: None,
            failed_allocations: 0,
        }
    }
}

// ── Shard copy ────────────────────────────────────────────────────

/// One physical copy of a shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardRouting {
    shard_id: ShardId,
    primary: bool,
    state: ShardState,
    current_node_id: Option<NodeId>,
    relocating_node_id: Option<NodeId>,
    tenant_id: TenantId,
    unassigned_info: Option<UnassignedInfo>,
}

impl ShardRouting {
    /// Build a copy from loose parts, checking the node/state invariant.
    pub fn new(
        tenant_id: TenantId,
        shard_id: ShardId,
        primary: bool,
        state: ShardState,
        current_node_id: Option<NodeId>,
        relocating_node_id: Option<NodeId>,
    ) -> RoutingResult<Self> {
        let invalid = |reason: &str| RoutingError::InvalidShardState {
            shard: shard_id.to_string(),
            reason: reason.to_string(),
        };

        match (state, &current_node_id) {
            (ShardState::Unassigned, Some(_)) => {
                return Err(invalid("unassigned copy must not have a current node"));
            }
            (ShardState::Unassigned, None) => {}
            (_, None) => return Err(invalid("assigned copy must have a current node")),
            (_, Some(_)) => {}
        }
        match (state, &relocating_node_id) {
            (ShardState::Relocating, None) => {
                return Err(invalid("relocating copy must have a relocation target"));
            }
            (ShardState::Relocating, Some(target)) if Some(target) == current_node_id.as_ref() => {
                return Err(invalid("relocation target must differ from the current node"));
            }
            (ShardState::Relocating, Some(_)) => {}
            (_, Some(_)) => return Err(invalid("only a relocating copy may have a relocation target")),
            (_, None) => {}
        }

        Ok(Self {
            shard_id,
            primary,
            state,
            current_node_id,
            relocating_node_id,
            tenant_id,
            unassigned_info: None,
        })
    }

    pub fn new_unassigned(tenant_id: TenantId, shard_id: ShardId, primary: bool, info: UnassignedInfo) -> Self {
        Self {
            shard_id,
            primary,
            state: ShardState::Unassigned,
            current_node_id: None,
            relocating_node_id: None,
            tenant_id,
            unassigned_info: Some(info),
        }
    }

    pub fn new_initializing(
        tenant_id: TenantId,
        shard_id: ShardId,
        primary: bool,
        node_id: impl Into<NodeId>,
    ) -> Self {
        Self::assigned(tenant_id, shard_id, primary, ShardState::Initializing, node_id.into())
    }

    pub fn new_started(
        tenant_id: TenantId,
        shard_id: ShardId,
        primary: bool,
        node_id: impl Into<NodeId>,
    ) -> Self {
        Self::assigned(tenant_id, shard_id, primary, ShardState::Started, node_id.into())
    }

    pub fn new_relocating(
        tenant_id: TenantId,
        shard_id: ShardId,
        primary: bool,
        node_id: impl Into<NodeId>,
        target_node_id: impl Into<NodeId>,
    ) -> Self {
        let mut copy = Self::assigned(tenant_id, shard_id, primary, ShardState::Relocating, node_id.into());
        copy.relocating_node_id = Some(target_node_id.into());
        copy
    }

    fn assigned(tenant_id: TenantId, shard_id: ShardId, primary: bool, state: ShardState, node_id: NodeId) -> Self {
        Self {
            shard_id,
            primary,
            state,
            current_node_id: Some(node_id),
            relocating_node_id: None,
            tenant_id,
            unassigned_info: None,
        }
    }

    /// Attach unassigned details. Ignored for assigned copies.
    pub fn with_unassigned_info(mut self, info: UnassignedInfo) -> Self {
        if self.state == ShardState::Unassigned {
            self.unassigned_info = Some(info);
        }
        self
    }

    pub fn shard_id(&self) -> &ShardId {
        &self.shard_id
    }

    pub fn index(&self) -> &str {
        &self.shard_id.index
    }

    pub fn primary(&self) -> bool {
        self.primary
    }

    pub fn state(&self) -> ShardState {
        self.state
    }

    pub fn current_node_id(&self) -> Option<&str> {
        self.current_node_id.as_deref()
    }

    pub fn relocating_node_id(&self) -> Option<&str> {
        self.relocating_node_id.as_deref()
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn unassigned_info(&self) -> Option<&UnassignedInfo> {
        self.unassigned_info.as_ref()
    }

    pub fn unassigned(&self) -> bool {
        self.state == ShardState::Unassigned
    }

    pub fn initializing(&self) -> bool {
        self.state == ShardState::Initializing
    }

    pub fn started(&self) -> bool {
        self.state == ShardState::Started
    }

    pub fn relocating(&self) -> bool {
        self.state == ShardState::Relocating
    }

    /// Initializing or relocating: a placement decision is already in effect.
    pub fn in_transition(&self) -> bool {
        self.initializing() || self.relocating()
    }

    /// Key used for this copy in [`crate::ClusterInfo`] shard sizes.
    pub fn size_key(&self) -> String {
        format!("{}[{}]", self.shard_id, if self.primary { "p" } else { "r" })
    }
}

impl fmt::Display for ShardRouting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, tenant[{}], node[{}], {}, s[{}]",
            self.shard_id,
            self.tenant_id,
            self.current_node_id.as_deref().unwrap_or("null"),
            if self.primary { "[P]" } else { "[R]" },
            self.state.as_str().to_uppercase(),
        )?;
        if let Some(target) = &self.relocating_node_id {
            write!(f, ", relocating [{target}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantId {
        TenantId::new("default")
    }

    #[test]
    fn new_rejects_unassigned_with_node() {
        let err = ShardRouting::new(
            tenant(),
            ShardId::new("logs", 0),
            true,
            ShardState::Unassigned,
            Some("n1".to_string()),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must not have a current node"));
    }

    #[test]
    fn new_rejects_started_without_node() {
        let err = ShardRouting::new(tenant(), ShardId::new("logs", 0), true, ShardState::Started, None, None)
            .unwrap_err();
        assert!(err.to_string().contains("must have a current node"));
    }

    #[test]
    fn new_rejects_relocation_target_outside_relocating() {
        let result = ShardRouting::new(
            tenant(),
            ShardId::new("logs", 0),
            false,
            ShardState::Started,
            Some("n1".to_string()),
            Some("n2".to_string()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn new_rejects_relocation_onto_same_node() {
        let result = ShardRouting::new(
            tenant(),
            ShardId::new("logs", 0),
            false,
            ShardState::Relocating,
            Some("n1".to_string()),
            Some("n1".to_string()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn relocating_constructor_sets_both_nodes() {
        let copy = ShardRouting::new_relocating(tenant(), ShardId::new("logs", 1), false, "n1", "n2");
        assert_eq!(copy.current_node_id(), Some("n1"));
        assert_eq!(copy.relocating_node_id(), Some("n2"));
        assert!(copy.in_transition());
    }

    #[test]
    fn unassigned_info_only_sticks_to_unassigned_copies() {
        let info = UnassignedInfo::new(UnassignedReason::NodeLeft, 1_000);
        let started = ShardRouting::new_started(tenant(), ShardId::new("logs", 0), true, "n1")
            .with_unassigned_info(info.clone());
        assert!(started.unassigned_info().is_none());

        let unassigned = ShardRouting::new_unassigned(tenant(), ShardId::new("logs", 0), false, info);
        assert_eq!(unassigned.unassigned_info().unwrap().reason, UnassignedReason::NodeLeft);
    }

    #[test]
    fn display_and_size_key() {
        let copy = ShardRouting::new_started(tenant(), ShardId::new("logs", 2), false, "n3");
        assert_eq!(copy.size_key(), "[logs][2][r]");
        assert_eq!(copy.to_string(), "[logs][2], tenant[default], node[n3], [R], s[STARTED]");
    }
}
