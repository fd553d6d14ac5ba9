use axum::extract::{Extension, Path, State};
use uuid::Uuid;

use crate::database::models::{LedgerEntry, Mason};
use crate::error::ApiError;
use crate::ledger::Reconciliation;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::AppState;

/// GET /masons/:id - Account with its cached balance and bag count
pub async fn get(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Mason> {
    auth_user.require_self_or_staff(id)?;
    let mason = state
        .ledger()
        .mason(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Mason {} not found", id)))?;
    Ok(ApiResponse::success(mason))
}

/// GET /masons/:id/ledger - Every ledger entry of the account, oldest first
pub async fn ledger(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<LedgerEntry>> {
    auth_user.require_self_or_staff(id)?;
    let entries = state
        .ledger()
        .ledger(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Mason {} not found", id)))?;
    Ok(ApiResponse::success(entries))
}

/// POST /masons/:id/reconcile - Re-sum the ledger and repair cached totals
pub async fn reconcile(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Reconciliation> {
    auth_user.require_approver()?;
    let report = state
        .ledger()
        .reconcile(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Mason {} not found", id)))?;

    let message = if report.corrected {
        "Cached totals corrected from ledger"
    } else {
        "Cached totals match ledger"
    };
    Ok(ApiResponse::success(report).with_message(message))
}
