//! Explanation assembly.
//!
//! Combines the located copy, the nodes it sits on, optional disk info and
//! the decision trace into an [`Explanation`]. Copies that are initializing
//! or relocating already have a placement decision in effect, so the
//! engine is not consulted for them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use allocview_routing::{ClusterInfo, DiscoveryNode, ShardRouting, UnassignedInfo};

use crate::context::{AllocationInputs, DebugMode};
use crate::decision::{DeciderReason, Decision, DecisionEngine, DecisionTrace, NodeDecision};

const ANY_UNASSIGNED_NOTE: &str = "No shard was specified in the explain request, so this response explains the first \
     eligible unassigned shard, preferring primaries. Other unassigned shards may be unassignable for different \
     reasons. Specify the target shard in the request to explain the allocation of any other shard.";

/// The explain response.
#[derive(Debug, Clone)]
pub struct Explanation {
    specific_shard: bool,
    shard: ShardRouting,
    current_node: Option<DiscoveryNode>,
    relocating_node: Option<DiscoveryNode>,
    cluster_info: Option<Arc<ClusterInfo>>,
    decision: DecisionTrace,
}

impl Explanation {
    pub fn is_specific_shard(&self) -> bool {
        self.specific_shard
    }

    pub fn shard(&self) -> &ShardRouting {
        &self.shard
    }

    pub fn current_node(&self) -> Option<&DiscoveryNode> {
        self.current_node.as_ref()
    }

    pub fn relocating_node(&self) -> Option<&DiscoveryNode> {
        self.relocating_node.as_ref()
    }

    pub fn cluster_info(&self) -> Option<&ClusterInfo> {
        self.cluster_info.as_deref()
    }

    pub fn decision(&self) -> &DecisionTrace {
        &self.decision
    }
}

/// Build the explanation for an already located copy.
///
/// The allocation context is created here, with its debug mode fixed from
/// `include_yes_decisions`, and dropped once the trace is built.
pub fn explain_shard(
    shard: ShardRouting,
    inputs: AllocationInputs,
    include_disk_info: bool,
    include_yes_decisions: bool,
    is_specific_shard: bool,
    engine: &dyn DecisionEngine,
) -> Explanation {
    let cluster_info = include_disk_info.then(|| Arc::clone(inputs.cluster_info()));
    let ctx = inputs.with_debug_mode(DebugMode::for_request(include_yes_decisions));

    let decision = if shard.in_transition() {
        DecisionTrace::NotTaken
    } else {
        engine.explain_shard_allocation(&shard, &ctx)
    };

    let nodes = ctx.nodes();
    let current_node = shard.current_node_id().and_then(|id| nodes.get(id)).cloned();
    let relocating_node = shard.relocating_node_id().and_then(|id| nodes.get(id)).cloned();

    Explanation {
        specific_shard: is_specific_shard,
        shard,
        current_node,
        relocating_node,
        cluster_info,
        decision,
    }
}

// ── Serialization ─────────────────────────────────────────────────

#[derive(Serialize)]
struct ExplanationBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'static str>,
    index: &'a str,
    shard: u32,
    primary: bool,
    current_state: &'static str,
    tenant: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    unassigned_info: Option<UnassignedInfoBody<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_node: Option<NodeBody<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    relocation_target_node: Option<NodeBody<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cluster_info: Option<&'a ClusterInfo>,
    #[serde(flatten)]
    decision: Option<DecisionBody<'a>>,
}

#[derive(Serialize)]
struct UnassignedInfoBody<'a> {
    reason: &'a allocview_routing::UnassignedReason,
    at_millis: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
    #[serde(skip_serializing_if = "is_zero")]
    failed_allocation_attempts: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

fn is_empty_map(map: &&BTreeMap<String, String>) -> bool {
    map.is_empty()
}

fn is_empty_slice<T>(slice: &&[T]) -> bool {
    slice.is_empty()
}

impl<'a> From<&'a UnassignedInfo> for UnassignedInfoBody<'a> {
    fn from(info: &'a UnassignedInfo) -> Self {
        Self {
            reason: &info.reason,
            at_millis: info.at_millis,
            details: info.details.as_deref(),
            failed_allocation_attempts: info.failed_allocations,
        }
    }
}

#[derive(Serialize)]
struct NodeBody<'a> {
    id: &'a str,
    name: &'a str,
    transport_address: &'a str,
    #[serde(skip_serializing_if = "is_empty_map")]
    attributes: &'a BTreeMap<String, String>,
}

impl<'a> From<&'a DiscoveryNode> for NodeBody<'a> {
    fn from(node: &'a DiscoveryNode) -> Self {
        Self {
            id: &node.id,
            name: &node.name,
            transport_address: &node.address,
            attributes: &node.attributes,
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum DecisionBody<'a> {
    Allocate {
        can_allocate: Decision,
        allocate_explanation: &'a str,
        node_allocation_decisions: &'a [NodeDecision],
    },
    Move {
        can_remain_on_current_node: Decision,
        #[serde(skip_serializing_if = "is_empty_slice")]
        can_remain_decisions: &'a [DeciderReason],
        #[serde(skip_serializing_if = "Option::is_none")]
        can_move_to_other_node: Option<Decision>,
        move_explanation: &'a str,
        node_allocation_decisions: &'a [NodeDecision],
    },
}

impl<'a> DecisionBody<'a> {
    fn from_trace(trace: &'a DecisionTrace) -> Option<Self> {
        match trace {
            DecisionTrace::NotTaken => None,
            DecisionTrace::Allocate(d) => Some(DecisionBody::Allocate {
                can_allocate: d.decision,
                allocate_explanation: &d.explanation,
                node_allocation_decisions: &d.node_decisions,
            }),
            DecisionTrace::Move(d) => Some(DecisionBody::Move {
                can_remain_on_current_node: d.can_remain,
                can_remain_decisions: &d.can_remain_reasons,
                can_move_to_other_node: d.can_move,
                move_explanation: &d.explanation,
                node_allocation_decisions: &d.node_decisions,
            }),
        }
    }
}

impl Serialize for Explanation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ExplanationBody {
            note: (!self.specific_shard).then_some(ANY_UNASSIGNED_NOTE),
            index: self.shard.index(),
            shard: self.shard.shard_id().shard,
            primary: self.shard.primary(),
            current_state: self.shard.state().as_str(),
            tenant: self.shard.tenant_id().as_str(),
            unassigned_info: self.shard.unassigned_info().map(UnassignedInfoBody::from),
            current_node: self.current_node.as_ref().map(NodeBody::from),
            relocation_target_node: self.relocating_node.as_ref().map(NodeBody::from),
            cluster_info: self.cluster_info.as_deref(),
            decision: DecisionBody::from_trace(&self.decision),
        }
        .serialize(serializer)
    }
}
