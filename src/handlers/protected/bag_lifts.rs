use axum::extract::{rejection::JsonRejection, Extension, Json, Path, State};
use uuid::Uuid;

use crate::approval::BagLiftUpdate;
use crate::database::models::BagLift;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::ledger_service::NewBagLift;
use crate::AppState;

/// POST /bag-lifts - Claim a bag lift for approval
///
/// Masons may only claim for themselves. The point value is fixed here and
/// credited unchanged if the lift is later approved.
pub async fn create(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    payload: Result<Json<NewBagLift>, JsonRejection>,
) -> ApiResult<BagLift> {
    let Json(input) = payload?;
    auth_user.require_self_or_staff(input.mason_id)?;

    let lift = state.ledger().create_bag_lift(input).await?;
    Ok(ApiResponse::created(lift).with_message("Bag lift submitted for approval"))
}

/// GET /bag-lifts/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<BagLift> {
    let lift = state
        .ledger()
        .bag_lift(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Bag lift {} not found", id)))?;
    auth_user.require_self_or_staff(lift.mason_id)?;

    Ok(ApiResponse::success(lift))
}

/// PATCH /bag-lifts/:id - Approve, reject or reverse a bag lift
///
/// Approval credits the lift's points and may pay slab and referral
/// bonuses; rejecting an approved lift debits the base points only.
pub async fn patch(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<BagLiftUpdate>, JsonRejection>,
) -> ApiResult<BagLift> {
    auth_user.require_approver()?;
    let Json(update) = payload?;

    let transition = state
        .approvals()
        .transition_bag_lift(id, update, auth_user.user_id)
        .await?;
    Ok(ApiResponse::success(transition.record).with_message(transition.message))
}
