//! Run lifecycle endpoints: start, report save, report fetch

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;
use tracing::info;

use crate::context::AppContext;
use crate::errors::{ApiError, ApiResult};
use surge_core::{RunGrant, RunReport, RunRequest};

/// `POST /api/v1/runs`: validate a run request and issue its grant.
pub async fn start_run(
    State(ctx): State<AppContext>,
    Json(request): Json<RunRequest>,
) -> ApiResult<Json<RunGrant>> {
    let grant = ctx.planner.plan(&request).await?;
    Ok(Json(grant))
}

/// `POST /api/v1/runs/{id}/report`: persist a finished run report.
///
/// Fire-and-forget from the orchestrator's side; idempotent here. An
/// abandoned run arrives through the same door with its own stop reason,
/// so no report is silently lost.
pub async fn save_report(
    State(ctx): State<AppContext>,
    Path(run_id): Path<String>,
    Json(report): Json<RunReport>,
) -> ApiResult<Json<serde_json::Value>> {
    if report.run_id != run_id {
        return Err(ApiError::BadRequest(format!(
            "report is for run {}, not {}",
            report.run_id, run_id
        )));
    }

    info!(run_id = %run_id, stop_reason = %report.stop_reason, steps = report.steps.len(), "report saved");
    ctx.reports.lock().insert(run_id.clone(), report);
    Ok(Json(json!({ "run_id": run_id, "saved": true })))
}

/// `GET /api/v1/runs/{id}/report`: fetch a saved report.
pub async fn get_report(
    State(ctx): State<AppContext>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<RunReport>> {
    ctx.reports
        .lock()
        .get(&run_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no report for run {}", run_id)))
}
