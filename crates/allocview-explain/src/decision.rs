//! Decision trace types and the decision-engine seam.

use serde::Serialize;

use allocview_routing::{DiscoveryNode, ShardRouting};

use crate::context::AllocationContext;

/// Verdict of one decider, one node, or a whole evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Yes,
    Throttle,
    No,
}

impl Decision {
    /// Combine two verdicts for the same node: the more restrictive wins.
    pub fn merge(self, other: Decision) -> Decision {
        match (self, other) {
            (Decision::No, _) | (_, Decision::No) => Decision::No,
            (Decision::Throttle, _) | (_, Decision::Throttle) => Decision::Throttle,
            _ => Decision::Yes,
        }
    }

    /// Combine verdicts across nodes: the most permissive wins. An empty
    /// set is `No`.
    pub fn best_of(decisions: impl IntoIterator<Item = Decision>) -> Decision {
        let mut best = Decision::No;
        for decision in decisions {
            match decision {
                Decision::Yes => return Decision::Yes,
                Decision::Throttle => best = Decision::Throttle,
                Decision::No => {}
            }
        }
        best
    }
}

/// One decider's contribution to a node decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeciderReason {
    pub decider: String,
    pub decision: Decision,
    pub explanation: String,
}

/// Verdict for placing the shard on one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeDecision {
    pub node_id: String,
    pub node_name: String,
    pub transport_address: String,
    pub decision: Decision,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<DeciderReason>,
}

impl NodeDecision {
    pub fn for_node(node: &DiscoveryNode, decision: Decision, reasons: Vec<DeciderReason>) -> Self {
        Self {
            node_id: node.id.clone(),
            node_name: node.name.clone(),
            transport_address: node.address.clone(),
            decision,
            reasons,
        }
    }
}

/// Where an unassigned copy could go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocateDecision {
    pub decision: Decision,
    pub explanation: String,
    pub node_decisions: Vec<NodeDecision>,
}

/// Whether an assigned copy may stay put, and where it could move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveDecision {
    pub can_remain: Decision,
    pub can_remain_reasons: Vec<DeciderReason>,
    /// Only evaluated when the copy cannot remain.
    pub can_move: Option<Decision>,
    pub explanation: String,
    pub node_decisions: Vec<NodeDecision>,
}

/// Result of asking the decision engine about one copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionTrace {
    /// Not evaluated.
    NotTaken,
    Allocate(AllocateDecision),
    Move(MoveDecision),
}

impl DecisionTrace {
    pub fn is_taken(&self) -> bool {
        !matches!(self, DecisionTrace::NotTaken)
    }

    pub fn node_decisions(&self) -> &[NodeDecision] {
        match self {
            DecisionTrace::NotTaken => &[],
            DecisionTrace::Allocate(d) => &d.node_decisions,
            DecisionTrace::Move(d) => &d.node_decisions,
        }
    }
}

/// Evaluates a shard copy against the cluster's nodes.
///
/// Implementations must only read from the context; the same context is
/// never handed to another request.
pub trait DecisionEngine: Send + Sync {
    fn explain_shard_allocation(&self, shard: &ShardRouting, ctx: &AllocationContext) -> DecisionTrace;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_restrictive() {
        assert_eq!(Decision::Yes.merge(Decision::Throttle), Decision::Throttle);
        assert_eq!(Decision::Throttle.merge(Decision::No), Decision::No);
        assert_eq!(Decision::Yes.merge(Decision::Yes), Decision::Yes);
    }

    #[test]
    fn best_of_prefers_permissive() {
        assert_eq!(Decision::best_of([Decision::No, Decision::Throttle]), Decision::Throttle);
        assert_eq!(Decision::best_of([Decision::No, Decision::Yes]), Decision::Yes);
        assert_eq!(Decision::best_of([]), Decision::No);
    }

    #[test]
    fn not_taken_has_no_node_decisions() {
        assert!(!DecisionTrace::NotTaken.is_taken());
        assert!(DecisionTrace::NotTaken.node_decisions().is_empty());
    }
}
