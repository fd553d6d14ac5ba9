use axum::extract::{Extension, Path, State};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::Journey;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::AppState;

/// GET /journeys/:id - Projected journey; other users' journeys are not found
pub async fn get(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Journey> {
    let journey = state
        .sync()
        .journey(&auth_user.caller(), id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Journey {} not found", id)))?;
    Ok(ApiResponse::success(journey))
}

/// POST /journeys/rebuild - Refold the projection from the op log
pub async fn rebuild(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    auth_user.require_admin()?;
    let journeys = state.sync().rebuild_journeys().await?;
    Ok(ApiResponse::success(json!({ "journeys": journeys })).with_message("Journey projection rebuilt"))
}
