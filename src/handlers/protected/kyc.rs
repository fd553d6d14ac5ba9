use axum::extract::{rejection::JsonRejection, Extension, Json, Path, State};
use uuid::Uuid;

use crate::approval::KycUpdate;
use crate::database::models::KycSubmission;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::ledger_service::NewKycSubmission;
use crate::AppState;

/// POST /kyc-submissions - Submit documents for review
pub async fn create(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    payload: Result<Json<NewKycSubmission>, JsonRejection>,
) -> ApiResult<KycSubmission> {
    let Json(input) = payload?;
    auth_user.require_self_or_staff(input.mason_id)?;

    let submission = state.ledger().submit_kyc(input).await?;
    Ok(ApiResponse::created(submission).with_message("KYC submitted for review"))
}

/// GET /kyc-submissions/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<KycSubmission> {
    let submission = state
        .ledger()
        .kyc(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("KYC submission {} not found", id)))?;
    auth_user.require_self_or_staff(submission.mason_id)?;

    Ok(ApiResponse::success(submission))
}

/// PATCH /kyc-submissions/:id - Decide a submission
///
/// The first approval of an account pays the joining bonus. Optional
/// `masonUpdates` are applied in the same transaction.
pub async fn patch(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<KycUpdate>, JsonRejection>,
) -> ApiResult<KycSubmission> {
    auth_user.require_approver()?;
    let Json(update) = payload?;

    let transition = state.approvals().transition_kyc(id, update).await?;
    Ok(ApiResponse::success(transition.record).with_message(transition.message))
}
