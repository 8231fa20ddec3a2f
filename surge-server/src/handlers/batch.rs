//! Batch dispatch and cancellation endpoints
//!
//! The dispatch handler is the trust boundary of the execution tier:
//! the caller holds a capability token, nothing more. Verification,
//! quota, and cancellation state are all keyed by the run id inside the
//! verified claims, never by anything the caller sent in the clear.

use std::time::Duration;

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::context::AppContext;
use crate::errors::{ApiError, ApiResult};
use surge_core::{BatchRequest, BatchResult, LatencySummary};

/// Batch dispatch response: the merged result plus its latency summary
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(flatten)]
    pub result: BatchResult,
    pub summary: LatencySummary,
}

/// Cancellation request body
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub run_id: String,
}

/// `POST /api/v1/batch`: execute one batch under a capability token.
pub async fn execute_batch(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(body): Json<BatchRequest>,
) -> ApiResult<Json<BatchResponse>> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

    let claims = ctx.tokens.verify(token, &body.url, body.count)?;

    // Server-side state for this run lives exactly as long as the token.
    let ttl = remaining_ttl(claims.exp);
    let ordinal = ctx.quota.try_acquire(&claims.sub, claims.max_batches, ttl)?;
    debug!(run_id = %claims.sub, ordinal, count = body.count, "batch accepted");

    let cancel = ctx.cancellations.handle(&claims.sub, ttl);
    let result = ctx.dispatcher.dispatch(&body.url, body.count, &cancel).await;

    let summary = result.summary();
    Ok(Json(BatchResponse { result, summary }))
}

/// `POST /api/v1/cancel`: set the cancellation flag for a run.
/// Idempotent: calling it twice has the same effect as once.
pub async fn cancel_run(
    State(ctx): State<AppContext>,
    Json(body): Json<CancelRequest>,
) -> Json<serde_json::Value> {
    ctx.cancellations.cancel(&body.run_id, ctx.tokens.ttl());
    Json(json!({ "run_id": body.run_id, "cancelled": true }))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn remaining_ttl(exp: i64) -> Duration {
    Duration::from_secs((exp - Utc::now().timestamp()).max(0) as u64)
}
