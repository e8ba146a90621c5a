//! Built-in rule engine.
//!
//! Evaluates a copy against every data node with a fixed set of deciders:
//! - **same_shard**: a node may hold at most one copy of a shard
//! - **replica_after_primary_active**: replicas wait for an active primary
//! - **node_version**: replicas never go to a node older than the primary's
//! - **disk_threshold**: no allocation past the high watermark
//! - **throttling**: cap on concurrent incoming recoveries per node
//!
//! A node's verdict is the most restrictive of its deciders; the overall
//! verdict is the most permissive across nodes.

use tracing::debug;

use allocview_core::DecidersConfig;
use allocview_routing::{DiscoveryNode, ShardRouting};

use crate::context::AllocationContext;
use crate::decision::{
    AllocateDecision, DeciderReason, Decision, DecisionEngine, DecisionTrace, MoveDecision, NodeDecision,
};

/// Decision engine backed by the built-in deciders.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    disk_high_watermark: f64,
    node_concurrent_recoveries: u32,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::from_config(&DecidersConfig::default())
    }
}

impl RuleEngine {
    pub fn new(disk_high_watermark: f64, node_concurrent_recoveries: u32) -> Self {
        Self {
            disk_high_watermark,
            node_concurrent_recoveries,
        }
    }

    pub fn from_config(config: &DecidersConfig) -> Self {
        Self::new(config.disk_high_watermark, config.node_concurrent_recoveries)
    }

    /// Every decider's verdict for placing `shard` on `node`.
    fn can_allocate(&self, shard: &ShardRouting, node: &DiscoveryNode, ctx: &AllocationContext) -> NodeDecision {
        let reasons = [
            same_shard(shard, node, ctx),
            replica_after_primary_active(shard, ctx),
            node_version(shard, node, ctx),
            self.disk_threshold(shard, node, ctx),
            self.throttling(node, ctx),
        ];
        let decision = reasons
            .iter()
            .fold(Decision::Yes, |acc, r| acc.merge(r.decision));
        let debug_mode = ctx.debug_mode();
        let reasons = reasons
            .into_iter()
            .filter(|r| debug_mode.records(r.decision))
            .collect();
        NodeDecision::for_node(node, decision, reasons)
    }

    fn disk_threshold(&self, shard: &ShardRouting, node: &DiscoveryNode, ctx: &AllocationContext) -> DeciderReason {
        let Some(usage) = ctx.cluster_info().disk_usage(&node.id) else {
            return reason(
                "disk_threshold",
                Decision::Yes,
                "the node has no disk usage information, allowing allocation".to_string(),
            );
        };

        let shard_size = ctx
            .cluster_info()
            .shard_size(shard)
            .or_else(|| ctx.snapshot_shard_sizes().size(shard.tenant_id(), shard.shard_id()))
            .unwrap_or(0);
        let projected = if usage.total_bytes == 0 {
            1.0
        } else {
            (usage.used_bytes().saturating_add(shard_size)) as f64 / usage.total_bytes as f64
        };

        if projected > self.disk_high_watermark {
            reason(
                "disk_threshold",
                Decision::No,
                format!(
                    "allocating the shard to this node would bring disk usage to {:.1}%, above the high watermark of {:.1}%",
                    projected * 100.0,
                    self.disk_high_watermark * 100.0
                ),
            )
        } else {
            reason(
                "disk_threshold",
                Decision::Yes,
                format!(
                    "disk usage after allocation would be {:.1}%, below the high watermark of {:.1}%",
                    projected * 100.0,
                    self.disk_high_watermark * 100.0
                ),
            )
        }
    }

    fn can_remain_on_disk(&self, node_id: &str, ctx: &AllocationContext) -> DeciderReason {
        match ctx.cluster_info().disk_usage(node_id) {
            Some(usage) if usage.used_fraction() > self.disk_high_watermark => reason(
                "disk_threshold",
                Decision::No,
                format!(
                    "the node is above the high watermark: disk usage is {:.1}%, watermark is {:.1}%",
                    usage.used_fraction() * 100.0,
                    self.disk_high_watermark * 100.0
                ),
            ),
            Some(_) => reason(
                "disk_threshold",
                Decision::Yes,
                "the node is below the high watermark, the shard can remain".to_string(),
            ),
            None => reason(
                "disk_threshold",
                Decision::Yes,
                "the node has no disk usage information, the shard can remain".to_string(),
            ),
        }
    }

    fn throttling(&self, node: &DiscoveryNode, ctx: &AllocationContext) -> DeciderReason {
        let incoming = ctx.snapshot().incoming_recoveries(&node.id);
        if incoming >= self.node_concurrent_recoveries as usize {
            reason(
                "throttling",
                Decision::Throttle,
                format!(
                    "reached the limit of incoming shard recoveries [{incoming}], limit is [{}]",
                    self.node_concurrent_recoveries
                ),
            )
        } else {
            reason(
                "throttling",
                Decision::Yes,
                format!(
                    "below shard recovery limit of incoming [{}]",
                    self.node_concurrent_recoveries
                ),
            )
        }
    }

    fn explain_unassigned(&self, shard: &ShardRouting, ctx: &AllocationContext) -> AllocateDecision {
        let mut node_decisions: Vec<NodeDecision> = ctx
            .nodes()
            .data_nodes()
            .map(|node| self.can_allocate(shard, node, ctx))
            .collect();
        sort_node_decisions(&mut node_decisions);

        let decision = Decision::best_of(node_decisions.iter().map(|d| d.decision));
        let explanation = match decision {
            Decision::Yes => "the shard can be allocated to at least one node".to_string(),
            Decision::Throttle => {
                "allocation is temporarily throttled on every node that could hold the shard".to_string()
            }
            Decision::No if node_decisions.is_empty() => {
                "there are no data nodes the shard could be allocated to".to_string()
            }
            Decision::No => "the shard cannot be allocated to any node in the cluster".to_string(),
        };

        AllocateDecision {
            decision,
            explanation,
            node_decisions,
        }
    }

    fn explain_assigned(&self, shard: &ShardRouting, current: &str, ctx: &AllocationContext) -> MoveDecision {
        let remain = self.can_remain_on_disk(current, ctx);
        let can_remain = remain.decision;
        let can_remain_reasons = if ctx.debug_mode().records(remain.decision) {
            vec![remain]
        } else {
            Vec::new()
        };

        let mut node_decisions: Vec<NodeDecision> = ctx
            .nodes()
            .data_nodes()
            .filter(|node| node.id != current)
            .map(|node| self.can_allocate(shard, node, ctx))
            .collect();
        sort_node_decisions(&mut node_decisions);

        let (can_move, explanation) = if can_remain == Decision::Yes {
            (None, "the shard can remain on its current node".to_string())
        } else {
            let can_move = Decision::best_of(node_decisions.iter().map(|d| d.decision));
            let explanation = match can_move {
                Decision::Yes => "the shard cannot remain on its current node and can move to another node",
                Decision::Throttle => {
                    "the shard cannot remain on its current node and moving it is temporarily throttled"
                }
                Decision::No => "the shard cannot remain on its current node and cannot move to any other node",
            };
            (Some(can_move), explanation.to_string())
        };

        MoveDecision {
            can_remain,
            can_remain_reasons,
            can_move,
            explanation,
            node_decisions,
        }
    }
}

impl DecisionEngine for RuleEngine {
    fn explain_shard_allocation(&self, shard: &ShardRouting, ctx: &AllocationContext) -> DecisionTrace {
        let trace = match shard.current_node_id() {
            None => DecisionTrace::Allocate(self.explain_unassigned(shard, ctx)),
            Some(current) => DecisionTrace::Move(self.explain_assigned(shard, current, ctx)),
        };
        debug!(
            shard = %shard,
            nodes = trace.node_decisions().len(),
            "evaluated shard allocation"
        );
        trace
    }
}

fn reason(decider: &str, decision: Decision, explanation: String) -> DeciderReason {
    DeciderReason {
        decider: decider.to_string(),
        decision,
        explanation,
    }
}

/// Yes first, then throttle, then no; node id order within each group.
fn sort_node_decisions(decisions: &mut [NodeDecision]) {
    decisions.sort_by_key(|d| match d.decision {
        Decision::Yes => 0,
        Decision::Throttle => 1,
        Decision::No => 2,
    });
}

fn same_shard(shard: &ShardRouting, node: &DiscoveryNode, ctx: &AllocationContext) -> DeciderReason {
    let conflict = ctx
        .snapshot()
        .copies_on_node(&node.id)
        .chain(
            ctx.snapshot()
                .all_copies()
                .filter(|c| c.relocating_node_id() == Some(node.id.as_str())),
        )
        .any(|c| c.tenant_id() == shard.tenant_id() && c.shard_id() == shard.shard_id());

    if conflict {
        reason(
            "same_shard",
            Decision::No,
            format!(
                "a copy of shard {} is already allocated to this node",
                shard.shard_id()
            ),
        )
    } else {
        reason(
            "same_shard",
            Decision::Yes,
            "this node does not hold a copy of the shard".to_string(),
        )
    }
}

fn replica_after_primary_active(shard: &ShardRouting, ctx: &AllocationContext) -> DeciderReason {
    if shard.primary() {
        return reason(
            "replica_after_primary_active",
            Decision::Yes,
            "shard is primary and can be allocated".to_string(),
        );
    }

    let primary_active = ctx
        .snapshot()
        .shard_routing_table(shard.tenant_id(), shard.index(), shard.shard_id().shard)
        .map(|table| {
            let primary = table.primary_shard();
            primary.started() || primary.relocating()
        })
        .unwrap_or(false);

    if primary_active {
        reason(
            "replica_after_primary_active",
            Decision::Yes,
            "primary shard for this replica is already active".to_string(),
        )
    } else {
        reason(
            "replica_after_primary_active",
            Decision::No,
            "primary shard for this replica is not yet active".to_string(),
        )
    }
}

fn node_version(shard: &ShardRouting, node: &DiscoveryNode, ctx: &AllocationContext) -> DeciderReason {
    if shard.primary() {
        return reason(
            "node_version",
            Decision::Yes,
            "the primary shard is new or already existed on the node".to_string(),
        );
    }

    let primary_node = ctx
        .snapshot()
        .shard_routing_table(shard.tenant_id(), shard.index(), shard.shard_id().shard)
        .and_then(|table| table.primary_shard().current_node_id())
        .and_then(|id| ctx.nodes().get(id));

    match primary_node {
        Some(primary_node) if node.version < primary_node.version => reason(
            "node_version",
            Decision::No,
            format!(
                "cannot allocate replica shard to a node with version [{}] since this is older than the primary version [{}]",
                node.version, primary_node.version
            ),
        ),
        Some(primary_node) => reason(
            "node_version",
            Decision::Yes,
            format!(
                "can allocate replica shard to a node with version [{}] since this is equal-or-newer than the primary version [{}]",
                node.version, primary_node.version
            ),
        ),
        None => reason(
            "node_version",
            Decision::Yes,
            "the primary shard is not assigned, no version constraint applies".to_string(),
        ),
    }
}
