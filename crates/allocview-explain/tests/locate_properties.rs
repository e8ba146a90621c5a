//! Shard selection behaviour across addressing modes and tenant scopes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use allocview_explain::*;
use allocview_routing::*;

fn node(id: &str, name: &str) -> DiscoveryNode {
    DiscoveryNode {
        id: id.to_string(),
        name: name.to_string(),
        address: format!("10.0.0.{}:9300", id.trim_start_matches('n')),
        roles: vec![NodeRole::Master, NodeRole::Data],
        version: semver::Version::new(8, 4, 0),
        attributes: BTreeMap::new(),
    }
}

fn nodes() -> Vec<DiscoveryNode> {
    vec![node("n1", "alpha"), node("n2", "beta"), node("n3", "gamma")]
}

fn tenant(id: &str) -> TenantId {
    TenantId::new(id)
}

fn scope(ids: &[&str]) -> TenantScope {
    ids.iter().map(|id| tenant(id)).collect()
}

fn unassigned(t: &str, index: &str, shard: u32, primary: bool) -> ShardRouting {
    ShardRouting::new_unassigned(
        tenant(t),
        ShardId::new(index, shard),
        primary,
        UnassignedInfo::new(UnassignedReason::NodeLeft, 1_700_000_000_000),
    )
}

fn started_primary(t: &str, index: &str, node: &str) -> ShardRouting {
    ShardRouting::new_started(tenant(t), ShardId::new(index, 0), true, node)
}

fn snapshot(copies: Vec<ShardRouting>) -> RoutingSnapshot {
    nodes()
        .into_iter()
        .fold(RoutingSnapshot::builder(), |b, n| b.node(n))
        .shards(copies)
        .build()
        .unwrap()
}

fn specific(index: &str, shard: u32, primary: bool, node: Option<&str>) -> ShardTarget {
    ShardTarget::Specific {
        index: index.to_string(),
        shard,
        primary,
        current_node: node.map(str::to_string),
    }
}

/// Primary of `logs/0` started on n1 plus the given replicas.
fn replicas_of(replicas: Vec<ShardRouting>) -> RoutingSnapshot {
    let mut copies = vec![ShardRouting::new_started(tenant("acme"), ShardId::new("logs", 0), true, "n1")];
    copies.extend(replicas);
    snapshot(copies)
}

fn replica_started(node: &str) -> ShardRouting {
    ShardRouting::new_started(tenant("acme"), ShardId::new("logs", 0), false, node)
}

fn replica_initializing(node: &str) -> ShardRouting {
    ShardRouting::new_initializing(tenant("acme"), ShardId::new("logs", 0), false, node)
}

fn replica_unassigned() -> ShardRouting {
    unassigned("acme", "logs", 0, false)
}

// ── Any unassigned ─────────────────────────────────────────────

#[test]
fn any_unassigned_prefers_primary_in_scope() {
    let snap = snapshot(vec![
        started_primary("acme", "a", "n1"),
        unassigned("acme", "a", 0, false),
        unassigned("other", "b", 0, true),
        started_primary("acme", "c", "n2"),
        unassigned("acme", "c", 0, false),
        unassigned("acme", "d", 0, true),
    ]);
    let found = locate(&ShardTarget::AnyUnassigned, &scope(&["acme"]), &snap).unwrap();
    assert_eq!(found.index(), "d");
    assert!(found.primary());
    assert_eq!(found.tenant_id(), &tenant("acme"));
}

#[test]
fn any_unassigned_falls_back_to_first_copy_in_scope() {
    let snap = snapshot(vec![
        unassigned("other", "b", 0, true),
        started_primary("acme", "a", "n1"),
        unassigned("acme", "a", 0, false),
        started_primary("acme", "c", "n2"),
        unassigned("acme", "c", 0, false),
    ]);
    let found = locate(&ShardTarget::AnyUnassigned, &scope(&["acme"]), &snap).unwrap();
    assert_eq!(found.index(), "a");
    assert!(!found.primary());
}

#[test]
fn any_unassigned_ignores_other_tenants() {
    let snap = snapshot(vec![unassigned("other", "b", 0, true), unassigned("other", "b", 1, true)]);
    let err = locate(&ShardTarget::AnyUnassigned, &scope(&["acme"]), &snap).unwrap_err();
    assert!(matches!(err, ExplainError::NoUnassignedShards));
}

#[test]
fn any_unassigned_with_empty_pool() {
    let snap = replicas_of(vec![replica_started("n2")]);
    let err = locate(&ShardTarget::AnyUnassigned, &scope(&["acme"]), &snap).unwrap_err();
    assert!(matches!(err, ExplainError::NoUnassignedShards));
}

#[test]
fn any_unassigned_is_deterministic() {
    let snap = snapshot(vec![
        started_primary("acme", "a", "n1"),
        unassigned("acme", "a", 0, false),
        unassigned("beta", "b", 0, true),
        unassigned("acme", "c", 0, true),
    ]);
    let both = scope(&["acme", "beta"]);
    let first = locate(&ShardTarget::AnyUnassigned, &both, &snap).unwrap();
    for _ in 0..10 {
        assert_eq!(locate(&ShardTarget::AnyUnassigned, &both, &snap).unwrap(), first);
    }
    assert_eq!(first.index(), "b");
}

// ── Specific primary ───────────────────────────────────────────

#[test]
fn specific_primary_without_node() {
    let snap = replicas_of(vec![replica_started("n2")]);
    let found = locate(&specific("logs", 0, true, None), &scope(&["acme"]), &snap).unwrap();
    assert!(found.primary());
    assert_eq!(found.current_node_id(), Some("n1"));
}

#[test]
fn specific_primary_node_must_match() {
    let snap = replicas_of(vec![replica_started("n2")]);
    let acme = scope(&["acme"]);

    assert!(locate(&specific("logs", 0, true, Some("n1")), &acme, &snap).is_ok());
    assert!(locate(&specific("logs", 0, true, Some("alpha")), &acme, &snap).is_ok());

    let err = locate(&specific("logs", 0, true, Some("n2")), &acme, &snap).unwrap_err();
    assert!(matches!(err, ExplainError::NodeMismatch { ref node } if node == "n2"));
}

#[test]
fn unknown_node_is_unresolved() {
    let snap = replicas_of(vec![replica_started("n2")]);
    let err = locate(&specific("logs", 0, true, Some("nowhere")), &scope(&["acme"]), &snap).unwrap_err();
    assert!(matches!(err, ExplainError::UnresolvedNode { .. }));
}

#[test]
fn unassigned_primary_with_node_is_a_mismatch() {
    let snap = snapshot(vec![unassigned("acme", "logs", 0, true)]);
    let err = locate(&specific("logs", 0, true, Some("n1")), &scope(&["acme"]), &snap).unwrap_err();
    assert!(matches!(err, ExplainError::NodeMismatch { .. }));
}

// ── Specific replica ───────────────────────────────────────────

#[test]
fn replica_scan_stops_at_unassigned() {
    let snap = replicas_of(vec![
        replica_started("n2"),
        replica_unassigned(),
        replica_initializing("n3"),
    ]);
    let found = locate(&specific("logs", 0, false, None), &scope(&["acme"]), &snap).unwrap();
    assert_eq!(found.state(), ShardState::Unassigned);
}

#[test]
fn replica_scan_prefers_started_over_initializing() {
    let snap = replicas_of(vec![replica_initializing("n2"), replica_started("n3")]);
    let found = locate(&specific("logs", 0, false, None), &scope(&["acme"]), &snap).unwrap();
    assert_eq!(found.state(), ShardState::Started);
    assert_eq!(found.current_node_id(), Some("n3"));
}

#[test]
fn replica_scan_returns_lone_relocating_copy() {
    let snap = replicas_of(vec![ShardRouting::new_relocating(
        tenant("acme"),
        ShardId::new("logs", 0),
        false,
        "n2",
        "n3",
    )]);
    let found = locate(&specific("logs", 0, false, None), &scope(&["acme"]), &snap).unwrap();
    assert_eq!(found.state(), ShardState::Relocating);
}

#[test]
fn replica_on_named_node() {
    let snap = replicas_of(vec![replica_started("n2"), replica_started("n3")]);
    let acme = scope(&["acme"]);

    let found = locate(&specific("logs", 0, false, Some("gamma")), &acme, &snap).unwrap();
    assert_eq!(found.current_node_id(), Some("n3"));

    let err = locate(&specific("logs", 0, false, Some("n1")), &acme, &snap).unwrap_err();
    assert!(matches!(err, ExplainError::ReplicaNotFoundOnNode { ref node } if node == "n1"));
}

#[test]
fn no_replicas_means_nothing_to_explain() {
    let snap = replicas_of(Vec::new());
    let err = locate(&specific("logs", 0, false, None), &scope(&["acme"]), &snap).unwrap_err();
    assert!(matches!(err, ExplainError::NoShardsToExplain { .. }));
}

// ── Scope and lookup failures ──────────────────────────────────

#[test]
fn specific_needs_exactly_one_tenant() {
    let snap = replicas_of(vec![replica_started("n2")]);
    let target = specific("logs", 0, true, None);

    let err = locate(&target, &scope(&["acme", "other"]), &snap).unwrap_err();
    assert!(matches!(err, ExplainError::AmbiguousTenantScope { count: 2 }));

    let err = locate(&target, &TenantScope::new(), &snap).unwrap_err();
    assert!(matches!(err, ExplainError::AmbiguousTenantScope { count: 0 }));
}

#[test]
fn missing_index_or_shard_is_not_found() {
    let snap = replicas_of(vec![replica_started("n2")]);
    let acme = scope(&["acme"]);

    let err = locate(&specific("metrics", 0, true, None), &acme, &snap).unwrap_err();
    assert!(matches!(err, ExplainError::ShardNotFound { .. }));

    let err = locate(&specific("logs", 7, true, None), &acme, &snap).unwrap_err();
    assert!(matches!(err, ExplainError::ShardNotFound { shard: 7, .. }));

    let err = locate(&specific("logs", 0, true, None), &scope(&["other"]), &snap).unwrap_err();
    assert!(matches!(err, ExplainError::ShardNotFound { .. }));
}

// ── Transitional copies ────────────────────────────────────────

#[test]
fn transitional_copies_skip_the_engine() {
    let snap = Arc::new(replicas_of(vec![replica_initializing("n2")]));
    let found = locate(&specific("logs", 0, false, None), &scope(&["acme"]), &snap).unwrap();
    assert!(found.initializing());

    let inputs = AllocationInputs::new(
        Arc::clone(&snap),
        Arc::new(ClusterInfo::default()),
        Arc::new(SnapshotShardSizes::default()),
        Instant::now(),
    );
    let explanation = explain_shard(found, inputs, false, false, true, &RuleEngine::default());
    assert_eq!(explanation.decision(), &DecisionTrace::NotTaken);
    assert_eq!(explanation.current_node().map(|n| n.name.as_str()), Some("beta"));
}
