use axum::extract::{rejection::JsonRejection, Extension, Json, Query, State};
use serde::Deserialize;
use serde_json::Value;

use crate::database::models::JourneyOp;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::sync_service::SyncOutcome;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default)]
    pub last_server_seq: i64,
    pub ops: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct PullQuery {
    /// Return ops with serverSeq strictly greater than this
    #[serde(default)]
    pub after: i64,
    pub limit: Option<i64>,
}

/// POST /journey-ops/sync - Push a batch of device ops
///
/// Always answers 200 with one ack per op, in request order; a bad op only
/// fails itself.
pub async fn push(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    payload: Result<Json<SyncRequest>, JsonRejection>,
) -> ApiResult<SyncOutcome> {
    let Json(request) = payload?;
    let outcome = state
        .sync()
        .sync_batch(&auth_user.caller(), request.last_server_seq, request.ops)
        .await?;
    Ok(ApiResponse::success(outcome))
}

/// GET /journey-ops?after=&limit= - Pull accepted ops in serverSeq order
pub async fn pull(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<PullQuery>,
) -> ApiResult<Vec<JourneyOp>> {
    let ops = state
        .sync()
        .ops_after(&auth_user.caller(), query.after, query.limit)
        .await?;
    Ok(ApiResponse::success(ops))
}
