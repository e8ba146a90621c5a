//! allocview-api: REST API for allocview.
//!
//! Exposes the explain pipeline and a small health summary of the
//! currently published cluster state.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET, POST | `/_cluster/allocation/explain` | Explain a shard's allocation |
//! | GET | `/_cluster/health` | Snapshot version, node and unassigned counts |
//!
//! The explain body (`index`, `shard`, `primary`, `current_node`) is
//! optional; `include_yes_decisions` and `include_disk_info` are query
//! parameters. Callers name their tenant with the `x-tenant-id` header.

pub mod handlers;

use std::time::Duration;

use axum::Router;
use axum::routing::get;

use allocview_explain::ExplainService;
use allocview_routing::SnapshotHolder;

/// Header carrying the caller's tenant.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub service: ExplainService,
    pub holder: SnapshotHolder,
    /// Upper bound on one explain call; late results are dropped.
    pub request_timeout: Duration,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/_cluster/allocation/explain",
            get(handlers::explain).post(handlers::explain),
        )
        .route("/_cluster/health", get(handlers::health))
        .with_state(state)
}
