//! Withdrawal handlers
//!
//! Users request withdrawals of their own balance; finance staff approve or
//! reject them. The balance is debited only on approval.

use crate::dto::withdrawal::{
    WithdrawalApproveRequest, WithdrawalCreateRequest, WithdrawalRejectRequest,
    WithdrawalResponse,
};
use crate::dto::{validate_request, ApiResponse};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use consulta_auth::AuthenticatedUser;
use consulta_core::AppError;
use consulta_services::NewWithdrawal;
use tracing::{info, instrument};
use uuid::Uuid;

/// POST /api/v1/withdrawals
#[instrument(skip(state, user, req), fields(user_id = %user.user_id))]
pub async fn request_withdrawal(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<WithdrawalCreateRequest>,
) -> Result<HttpResponse, AppError> {
    validate_request(&*req, "Withdrawal request")?;
    let req = req.into_inner();

    let withdrawal = state
        .services
        .withdrawals
        .request(NewWithdrawal {
            user_id: user.user_id,
            balance_amount: req.amount,
            destination: req.destination,
            network: req.network,
        })
        .await?;

    info!(withdrawal_id = %withdrawal.id, "Withdrawal requested via API");
    Ok(HttpResponse::Created().json(ApiResponse::success(WithdrawalResponse::from(withdrawal))))
}

/// POST /api/v1/withdrawals/{id}/approve
#[instrument(skip(state, user, req), fields(admin_id = %user.user_id))]
pub async fn approve_withdrawal(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<WithdrawalApproveRequest>,
) -> Result<HttpResponse, AppError> {
    validate_request(&*req, "Withdrawal approval")?;
    let req = req.into_inner();

    let withdrawal = state
        .services
        .withdrawals
        .approve(path.into_inner(), user.user_id, req.mode, req.tx_hash)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        WithdrawalResponse::from(withdrawal),
        "Withdrawal approved",
    )))
}

/// POST /api/v1/withdrawals/{id}/reject
#[instrument(skip(state, user, req), fields(admin_id = %user.user_id))]
pub async fn reject_withdrawal(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<WithdrawalRejectRequest>,
) -> Result<HttpResponse, AppError> {
    validate_request(&*req, "Withdrawal rejection")?;

    let withdrawal = state
        .services
        .withdrawals
        .reject(path.into_inner(), user.user_id, &req.reason)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        WithdrawalResponse::from(withdrawal),
        "Withdrawal rejected",
    )))
}
