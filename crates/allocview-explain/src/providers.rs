//! Collaborators the explain pipeline reads from.
//!
//! Each trait is one synchronous call made at the start of a request. The
//! [`SnapshotHolder`] implements the three cluster-facing ones.

use std::sync::Arc;

use allocview_core::{TenancyConfig, TenancyMode};
use allocview_routing::{ClusterInfo, RoutingSnapshot, SnapshotHolder, SnapshotShardSizes, TenantId, TenantScope};

/// Supplies the current routing snapshot.
pub trait ClusterStateProvider: Send + Sync {
    fn current_snapshot(&self) -> Arc<RoutingSnapshot>;
}

/// Supplies per-node disk usage and known shard sizes.
pub trait ClusterInfoProvider: Send + Sync {
    fn cluster_info(&self) -> Arc<ClusterInfo>;
}

/// Supplies expected sizes of shards restored from snapshots.
pub trait SnapshotSizeProvider: Send + Sync {
    fn snapshot_shard_sizes(&self) -> Arc<SnapshotShardSizes>;
}

/// Identity of the caller, as far as tenant scoping cares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    /// Tenant the caller declared, if any.
    pub tenant: Option<TenantId>,
}

impl CallerContext {
    pub fn for_tenant(tenant: TenantId) -> Self {
        Self { tenant: Some(tenant) }
    }
}

/// Decides which tenants a caller may see in a snapshot.
pub trait TenantResolver: Send + Sync {
    fn tenant_scope(&self, snapshot: &RoutingSnapshot, caller: &CallerContext) -> TenantScope;
}

/// Every caller sees exactly one fixed tenant.
#[derive(Debug, Clone)]
pub struct SingleTenantResolver {
    tenant: TenantId,
}

impl SingleTenantResolver {
    pub fn new(tenant: TenantId) -> Self {
        Self { tenant }
    }
}

impl TenantResolver for SingleTenantResolver {
    fn tenant_scope(&self, _snapshot: &RoutingSnapshot, _caller: &CallerContext) -> TenantScope {
        TenantScope::from([self.tenant.clone()])
    }
}

/// Scope comes from the caller's declared tenant; callers that declare
/// none see every tenant in the snapshot.
#[derive(Debug, Clone, Default)]
pub struct HeaderTenantResolver;

impl TenantResolver for HeaderTenantResolver {
    fn tenant_scope(&self, snapshot: &RoutingSnapshot, caller: &CallerContext) -> TenantScope {
        match &caller.tenant {
            Some(tenant) => TenantScope::from([tenant.clone()]),
            None => snapshot.tenants().cloned().collect(),
        }
    }
}

/// Build the resolver selected by `[tenancy]`.
pub fn tenant_resolver(config: &TenancyConfig) -> Arc<dyn TenantResolver> {
    match config.mode {
        TenancyMode::Single => Arc::new(SingleTenantResolver::new(TenantId::new(config.default_tenant.clone()))),
        TenancyMode::Multi => Arc::new(HeaderTenantResolver),
    }
}

impl ClusterStateProvider for SnapshotHolder {
    fn current_snapshot(&self) -> Arc<RoutingSnapshot> {
        Arc::clone(self.current().snapshot())
    }
}

impl ClusterInfoProvider for SnapshotHolder {
    fn cluster_info(&self) -> Arc<ClusterInfo> {
        Arc::clone(self.current().cluster_info())
    }
}

impl SnapshotSizeProvider for SnapshotHolder {
    fn snapshot_shard_sizes(&self) -> Arc<SnapshotShardSizes> {
        Arc::clone(self.current().snapshot_shard_sizes())
    }
}
