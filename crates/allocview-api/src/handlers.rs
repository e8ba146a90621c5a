//! REST API handlers.
//!
//! Every failure is answered with
//! `{ "error": { "type": ..., "reason": ... }, "status": ... }`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use allocview_explain::{CallerContext, ExplainError, ExplainRequest};
use allocview_routing::TenantId;

use crate::{ApiState, TENANT_HEADER};

/// Error response body.
#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
    status: u16,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    reason: String,
}

fn error_response(kind: &str, reason: String, status: StatusCode) -> Response {
    (
        status,
        Json(ErrorBody {
            error: ErrorDetail { kind, reason },
            status: status.as_u16(),
        }),
    )
        .into_response()
}

/// HTTP status an explain failure is reported with.
pub fn status_for(err: &ExplainError) -> StatusCode {
    match err {
        ExplainError::Validation(_)
        | ExplainError::AmbiguousTenantScope { .. }
        | ExplainError::NoUnassignedShards
        | ExplainError::NodeMismatch { .. }
        | ExplainError::ReplicaNotFoundOnNode { .. }
        | ExplainError::NoShardsToExplain { .. }
        | ExplainError::UnresolvedNode { .. } => StatusCode::BAD_REQUEST,
        ExplainError::ShardNotFound { .. } => StatusCode::NOT_FOUND,
        ExplainError::ClusterBlocked { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ExplainError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn explain_error_response(err: &ExplainError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        warn!(error = %err, status = status.as_u16(), "explain failed");
    } else {
        debug!(error = %err, status = status.as_u16(), "explain rejected");
    }
    error_response(err.error_type(), err.to_string(), status)
}

// ── Explain ────────────────────────────────────────────────────

/// Query parameters of the explain endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ExplainParams {
    pub include_yes_decisions: Option<bool>,
    pub include_disk_info: Option<bool>,
}

fn parse_body(body: &[u8]) -> Result<ExplainRequest, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ExplainRequest::any_unassigned());
    }
    serde_json::from_slice(body).map_err(|e| format!("failed to parse request body: {e}"))
}

fn caller_context(headers: &HeaderMap) -> Result<CallerContext, String> {
    let Some(value) = headers.get(TENANT_HEADER) else {
        return Ok(CallerContext::default());
    };
    let tenant = value
        .to_str()
        .map_err(|_| format!("header [{TENANT_HEADER}] must be visible ASCII"))?
        .trim();
    if tenant.is_empty() {
        return Err(format!("header [{TENANT_HEADER}] must not be empty"));
    }
    Ok(CallerContext::for_tenant(TenantId::new(tenant)))
}

/// GET|POST /_cluster/allocation/explain
pub async fn explain(
    State(state): State<ApiState>,
    headers: HeaderMap,
    params: Result<Query<ExplainParams>, QueryRejection>,
    body: Bytes,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(e) => return error_response("illegal_argument_exception", e.body_text(), StatusCode::BAD_REQUEST),
    };
    let mut request = match parse_body(&body) {
        Ok(request) => request,
        Err(reason) => return error_response("parse_exception", reason, StatusCode::BAD_REQUEST),
    };
    if let Some(include) = params.include_yes_decisions {
        request.include_yes_decisions = include;
    }
    if let Some(include) = params.include_disk_info {
        request.include_disk_info = include;
    }
    let caller = match caller_context(&headers) {
        Ok(caller) => caller,
        Err(reason) => return error_response("illegal_argument_exception", reason, StatusCode::BAD_REQUEST),
    };

    debug!(%request, tenant = ?caller.tenant, "explain request");
    match tokio::time::timeout(state.request_timeout, state.service.explain(request, caller)).await {
        Ok(Ok(explanation)) => Json(explanation).into_response(),
        Ok(Err(err)) => explain_error_response(&err),
        Err(_) => {
            warn!(timeout = ?state.request_timeout, "explain timed out");
            error_response(
                "timeout_exception",
                format!("explain did not complete within {:?}", state.request_timeout),
                StatusCode::GATEWAY_TIMEOUT,
            )
        }
    }
}

// ── Health ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Green,
    Yellow,
    Red,
}

/// Summary of the published snapshot.
#[derive(Debug, Serialize)]
pub struct HealthSummary {
    pub cluster_name: String,
    pub status: HealthStatus,
    pub version: u64,
    pub number_of_nodes: usize,
    pub number_of_data_nodes: usize,
    pub number_of_tenants: usize,
    pub unassigned_shards: usize,
    pub unassigned_primary_shards: usize,
}

/// GET /_cluster/health
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let current = state.holder.current();
    let snapshot = current.snapshot();
    let unassigned = snapshot.unassigned();
    let unassigned_primary_shards = unassigned.iter().filter(|c| c.primary()).count();

    let status = if unassigned_primary_shards > 0 {
        HealthStatus::Red
    } else if !unassigned.is_empty() {
        HealthStatus::Yellow
    } else {
        HealthStatus::Green
    };

    Json(HealthSummary {
        cluster_name: snapshot.cluster_name().to_string(),
        status,
        version: snapshot.version(),
        number_of_nodes: snapshot.nodes().len(),
        number_of_data_nodes: snapshot.nodes().data_nodes().count(),
        number_of_tenants: snapshot.tenants().count(),
        unassigned_shards: unassigned.len(),
        unassigned_primary_shards,
    })
}
