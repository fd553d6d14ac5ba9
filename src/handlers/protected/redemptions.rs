use axum::extract::{rejection::JsonRejection, Extension, Json, Path, State};
use uuid::Uuid;

use crate::approval::RedemptionUpdate;
use crate::database::models::RewardRedemption;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::ledger_service::NewRedemption;
use crate::AppState;

/// POST /rewards-redemption - Place a redemption, debiting its points
pub async fn create(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    payload: Result<Json<NewRedemption>, JsonRejection>,
) -> ApiResult<RewardRedemption> {
    let Json(input) = payload?;
    auth_user.require_self_or_staff(input.mason_id)?;

    let redemption = state.ledger().place_redemption(input).await?;
    let message = format!("Redemption placed; {} points debited", redemption.points_debited);
    Ok(ApiResponse::created(redemption).with_message(message))
}

/// GET /rewards-redemption/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<RewardRedemption> {
    let redemption = state
        .ledger()
        .redemption(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Redemption {} not found", id)))?;
    auth_user.require_self_or_staff(redemption.mason_id)?;

    Ok(ApiResponse::success(redemption))
}

/// PATCH /rewards-redemption/:id - Move a redemption through fulfillment
pub async fn patch(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<RedemptionUpdate>, JsonRejection>,
) -> ApiResult<RewardRedemption> {
    auth_user.require_approver()?;
    let Json(update) = payload?;

    let transition = state.approvals().transition_redemption(id, update).await?;
    Ok(ApiResponse::success(transition.record).with_message(transition.message))
}
