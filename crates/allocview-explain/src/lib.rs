//! allocview-explain: explains where a shard copy can be allocated.
//!
//! Given a routing snapshot, the explain pipeline picks one shard copy
//! (either "any unassigned shard" or a precisely addressed copy), asks a
//! decision engine for a per-node verdict, and assembles the result into
//! an [`Explanation`].
//!
//! # Components
//!
//! - **`request`**: Request fields and addressing-mode validation
//! - **`locator`**: Deterministic shard-copy selection
//! - **`context`**: Immutable per-request allocation context
//! - **`decision`**: Decision trace types and the `DecisionEngine` seam
//! - **`deciders`**: Built-in rule engine
//! - **`assembler`**: Builds the `Explanation` record
//! - **`providers`**: Collaborator traits (cluster state, disk info, tenants)
//! - **`service`**: Request pipeline on a bounded management pool

pub mod assembler;
pub mod context;
pub mod deciders;
pub mod decision;
pub mod error;
pub mod locator;
pub mod providers;
pub mod request;
pub mod service;

pub use assembler::{Explanation, explain_shard};
pub use context::{AllocationContext, AllocationInputs, DebugMode};
pub use deciders::RuleEngine;
pub use decision::{
    AllocateDecision, DeciderReason, Decision, DecisionEngine, DecisionTrace, MoveDecision, NodeDecision,
};
pub use error::{ExplainError, ExplainResult};
pub use locator::{ReplicaPreference, ShardTarget, locate, replica_preference};
pub use providers::{
    CallerContext, ClusterInfoProvider, ClusterStateProvider, HeaderTenantResolver, SingleTenantResolver,
    SnapshotSizeProvider, TenantResolver, tenant_resolver,
};
pub use request::ExplainRequest;
pub use service::ExplainService;
