//! The per-request explain pipeline.
//!
//! validate → snapshot → block check → tenant scope → allocation inputs
//! → locate → explain. Each request runs once through the pipeline on the
//! bounded management pool; any stage failing fails the request.
//!
//! # Architecture
//!
//! ```text
//! ExplainService
//!   ├── ClusterSources (one SnapshotHolder, or three separate providers)
//!   ├── TenantResolver
//!   ├── DecisionEngine
//!   └── Semaphore (management_workers permits, one per running request)
//! ```

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use allocview_routing::{BlockLevel, ClusterInfo, RoutingSnapshot, SnapshotHolder, SnapshotShardSizes};

use crate::assembler::{Explanation, explain_shard};
use crate::context::AllocationInputs;
use crate::decision::DecisionEngine;
use crate::error::{ExplainError, ExplainResult};
use crate::locator::locate;
use crate::providers::{CallerContext, ClusterInfoProvider, ClusterStateProvider, SnapshotSizeProvider, TenantResolver};
use crate::request::ExplainRequest;

/// Where a request reads its cluster state from.
#[derive(Clone)]
enum ClusterSources {
    /// All three views come from one published state.
    Holder(SnapshotHolder),
    Providers {
        cluster_state: Arc<dyn ClusterStateProvider>,
        cluster_info: Arc<dyn ClusterInfoProvider>,
        snapshot_sizes: Arc<dyn SnapshotSizeProvider>,
    },
}

impl ClusterSources {
    fn read(&self) -> (Arc<RoutingSnapshot>, Arc<ClusterInfo>, Arc<SnapshotShardSizes>) {
        match self {
            ClusterSources::Holder(holder) => {
                let state = holder.current();
                (
                    Arc::clone(state.snapshot()),
                    Arc::clone(state.cluster_info()),
                    Arc::clone(state.snapshot_shard_sizes()),
                )
            }
            ClusterSources::Providers {
                cluster_state,
                cluster_info,
                snapshot_sizes,
            } => (
                cluster_state.current_snapshot(),
                cluster_info.cluster_info(),
                snapshot_sizes.snapshot_shard_sizes(),
            ),
        }
    }
}

/// Runs explain requests against the collaborators it was built with.
///
/// `Clone` is cheap; clones share the worker permits.
#[derive(Clone)]
pub struct ExplainService {
    sources: ClusterSources,
    tenants: Arc<dyn TenantResolver>,
    engine: Arc<dyn DecisionEngine>,
    workers: Arc<Semaphore>,
}

impl ExplainService {
    pub fn new(
        cluster_state: Arc<dyn ClusterStateProvider>,
        cluster_info: Arc<dyn ClusterInfoProvider>,
        snapshot_sizes: Arc<dyn SnapshotSizeProvider>,
        tenants: Arc<dyn TenantResolver>,
        engine: Arc<dyn DecisionEngine>,
        management_workers: usize,
    ) -> Self {
        Self::with_sources(
            ClusterSources::Providers {
                cluster_state,
                cluster_info,
                snapshot_sizes,
            },
            tenants,
            engine,
            management_workers,
        )
    }

    /// Read routing, disk usage and restore sizes from one holder. Each
    /// request sees a single published state.
    pub fn from_holder(
        holder: SnapshotHolder,
        tenants: Arc<dyn TenantResolver>,
        engine: Arc<dyn DecisionEngine>,
        management_workers: usize,
    ) -> Self {
        Self::with_sources(ClusterSources::Holder(holder), tenants, engine, management_workers)
    }

    fn with_sources(
        sources: ClusterSources,
        tenants: Arc<dyn TenantResolver>,
        engine: Arc<dyn DecisionEngine>,
        management_workers: usize,
    ) -> Self {
        Self {
            sources,
            tenants,
            engine,
            workers: Arc::new(Semaphore::new(management_workers.max(1))),
        }
    }

    /// Permits not currently held by a running request.
    pub fn available_workers(&self) -> usize {
        self.workers.available_permits()
    }

    /// Explain on the management pool. Waits for a free worker first.
    pub async fn explain(&self, request: ExplainRequest, caller: CallerContext) -> ExplainResult<Explanation> {
        let permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|_| ExplainError::Unavailable("management pool is shut down".to_string()))?;

        let service = self.clone();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            service.explain_blocking(&request, &caller)
        })
        .await
        .map_err(|e| {
            warn!(error = %e, "explain task failed");
            ExplainError::Unavailable(format!("explain task failed: {e}"))
        })?
    }

    /// The pipeline itself, on the calling thread.
    pub fn explain_blocking(&self, request: &ExplainRequest, caller: &CallerContext) -> ExplainResult<Explanation> {
        let target = request.target()?;

        let (snapshot, cluster_info, snapshot_sizes) = self.sources.read();
        if let Some(block) = snapshot.blocks().global_blocked(BlockLevel::MetadataRead) {
            return Err(ExplainError::ClusterBlocked {
                id: block.id,
                description: block.description.clone(),
            });
        }

        let scope = self.tenants.tenant_scope(&snapshot, caller);
        let inputs = AllocationInputs::new(snapshot, cluster_info, snapshot_sizes, Instant::now());

        let shard = locate(&target, &scope, inputs.snapshot())?;
        debug!(%request, %shard, "explaining the allocation for request, found shard");

        Ok(explain_shard(
            shard,
            inputs,
            request.include_disk_info,
            request.include_yes_decisions,
            target.is_specific(),
            self.engine.as_ref(),
        ))
    }
}
