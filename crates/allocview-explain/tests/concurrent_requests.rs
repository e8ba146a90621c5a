//! Parallel explain requests against one published cluster state.

use std::collections::BTreeMap;
use std::sync::Arc;

use allocview_explain::*;
use allocview_routing::*;

const STATE: &str = r#"{
    "cluster_name": "prod",
    "version": 12,
    "nodes": [
        { "id": "n1", "name": "alpha", "address": "10.0.0.1:9300", "version": "8.4.0" },
        { "id": "n2", "name": "beta", "address": "10.0.0.2:9300", "version": "8.4.0" },
        { "id": "n3", "name": "gamma", "address": "10.0.0.3:9300", "version": "8.3.0" }
    ],
    "indices": [
        {
            "name": "logs",
            "tenant": "acme",
            "shards": [
                { "shard": 0, "copies": [
                    { "primary": true, "state": "STARTED", "node": "n1" },
                    { "primary": false, "state": "UNASSIGNED",
                      "unassigned_info": { "reason": "NODE_LEFT", "at_millis": 1700000000000 } }
                ] },
                { "shard": 1, "copies": [
                    { "primary": true, "state": "STARTED", "node": "n2" },
                    { "primary": false, "state": "STARTED", "node": "n3" }
                ] }
            ]
        },
        {
            "name": "metrics",
            "tenant": "globex",
            "shards": [
                { "shard": 0, "copies": [
                    { "primary": true, "state": "UNASSIGNED",
                      "unassigned_info": { "reason": "INDEX_CREATED", "at_millis": 1700000000000 } }
                ] }
            ]
        }
    ],
    "cluster_info": {
        "disk_usages": {
            "n1": { "total_bytes": 1000, "free_bytes": 500 },
            "n2": { "total_bytes": 1000, "free_bytes": 50 },
            "n3": { "total_bytes": 1000, "free_bytes": 800 }
        },
        "shard_sizes": { "acme": { "[logs][0][p]": 100 } }
    }
}"#;

fn holder() -> SnapshotHolder {
    let state = ClusterStateDocument::from_json(STATE)
        .unwrap()
        .into_cluster_state()
        .unwrap();
    SnapshotHolder::new(state)
}

fn service(holder: SnapshotHolder, workers: usize) -> ExplainService {
    ExplainService::from_holder(
        holder,
        Arc::new(HeaderTenantResolver),
        Arc::new(RuleEngine::default()),
        workers,
    )
}

fn requests() -> Vec<(ExplainRequest, CallerContext)> {
    let acme = CallerContext::for_tenant(TenantId::new("acme"));
    let globex = CallerContext::for_tenant(TenantId::new("globex"));
    vec![
        (ExplainRequest::any_unassigned(), CallerContext::default()),
        (ExplainRequest::any_unassigned(), acme.clone()),
        (ExplainRequest::any_unassigned().with_yes_decisions(true), globex.clone()),
        (ExplainRequest::for_shard("logs", 0, true).with_disk_info(true), acme.clone()),
        (ExplainRequest::for_shard("logs", 0, false), acme.clone()),
        (ExplainRequest::for_shard("logs", 1, false).on_node("gamma"), acme.clone()),
        (ExplainRequest::for_shard("logs", 1, true).on_node("n1"), acme.clone()),
        (ExplainRequest::for_shard("metrics", 0, true), acme),
        (ExplainRequest::for_shard("metrics", 0, true), globex),
    ]
}

fn render(result: &ExplainResult<Explanation>) -> String {
    match result {
        Ok(explanation) => serde_json::to_string(explanation).unwrap(),
        Err(err) => format!("{}: {err}", err.error_type()),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_requests_match_sequential_results() {
    let svc = service(holder(), 3);

    let sequential: Vec<String> = requests()
        .iter()
        .map(|(req, caller)| render(&svc.explain_blocking(req, caller)))
        .collect();

    let mut handles = Vec::new();
    for round in 0..8 {
        for (i, (req, caller)) in requests().into_iter().enumerate() {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                let result = svc.explain(req, caller).await;
                (round, i, render(&result))
            }));
        }
    }

    for handle in handles {
        let (round, i, rendered) = handle.await.unwrap();
        assert_eq!(rendered, sequential[i], "request {i} differed in round {round}");
    }
    assert_eq!(svc.available_workers(), 3);
}

#[tokio::test]
async fn expected_outcomes_per_request() {
    let svc = service(holder(), 2);
    let results: Vec<_> = {
        let mut out = Vec::new();
        for (req, caller) in requests() {
            out.push(svc.explain(req, caller).await);
        }
        out
    };

    // No tenant declared: every tenant is in scope, metrics/0 is the first primary.
    let first = results[0].as_ref().unwrap();
    assert_eq!(first.shard().index(), "metrics");
    assert!(!first.is_specific_shard());

    let acme_any = results[1].as_ref().unwrap();
    assert_eq!(acme_any.shard().index(), "logs");
    assert!(!acme_any.shard().primary());

    let primary = results[3].as_ref().unwrap();
    assert!(primary.cluster_info().is_some());
    assert!(matches!(primary.decision(), DecisionTrace::Move(_)));

    let replica = results[4].as_ref().unwrap();
    assert!(replica.shard().unassigned());
    assert!(matches!(replica.decision(), DecisionTrace::Allocate(_)));

    let on_gamma = results[5].as_ref().unwrap();
    assert_eq!(on_gamma.current_node().map(|n| n.id.as_str()), Some("n3"));

    assert!(matches!(results[6], Err(ExplainError::NodeMismatch { .. })));
    assert!(matches!(results[7], Err(ExplainError::ShardNotFound { .. })));
    assert!(results[8].is_ok());
}

#[tokio::test]
async fn published_state_is_seen_by_later_requests() {
    let holder = holder();
    let svc = service(holder.clone(), 1);
    let caller = CallerContext::for_tenant(TenantId::new("acme"));

    let before = svc.explain(ExplainRequest::any_unassigned(), caller.clone()).await;
    assert!(before.is_ok());

    let node = DiscoveryNode {
        id: "n1".to_string(),
        name: "alpha".to_string(),
        address: "10.0.0.1:9300".to_string(),
        roles: vec![NodeRole::Data],
        version: semver::Version::new(8, 4, 0),
        attributes: BTreeMap::new(),
    };
    let settled = RoutingSnapshot::builder()
        .version(13)
        .node(node)
        .tenant(TenantId::new("acme"))
        .shard(ShardRouting::new_started(TenantId::new("acme"), ShardId::new("logs", 0), true, "n1"))
        .build()
        .unwrap();
    let replaced = holder.publish(ClusterState::new(
        settled,
        ClusterInfo::default(),
        SnapshotShardSizes::default(),
    ));
    assert_eq!(replaced, 12);

    let after = svc.explain(ExplainRequest::any_unassigned(), caller).await;
    assert!(matches!(after, Err(ExplainError::NoUnassignedShards)));
}

#[tokio::test]
async fn blocked_cluster_rejects_every_request() {
    let mut doc = ClusterStateDocument::from_json(STATE).unwrap();
    doc.blocks.push(ClusterBlock {
        id: 2,
        description: "no master".to_string(),
        levels: vec![BlockLevel::MetadataRead, BlockLevel::MetadataWrite],
        retryable: true,
    });
    let svc = service(SnapshotHolder::new(doc.into_cluster_state().unwrap()), 2);

    for (req, caller) in requests() {
        if req.validate().is_err() {
            continue;
        }
        let err = svc.explain(req, caller).await.unwrap_err();
        assert!(matches!(err, ExplainError::ClusterBlocked { id: 2, .. }));
    }
}
