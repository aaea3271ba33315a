//! Balance handlers

use crate::dto::balance::{BalanceResponse, BalanceTransactionResponse, HistoryParams};
use crate::dto::{validate_request, ApiResponse};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use consulta_auth::AuthenticatedUser;
use consulta_core::AppError;
use tracing::instrument;
use uuid::Uuid;

/// GET /api/v1/balances/{user_id}
#[instrument(skip(state, user))]
pub async fn get_balance(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    if !user.can_act_for(user_id) {
        return Err(AppError::Forbidden);
    }

    let balance = state.services.balances.balance(user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(BalanceResponse::new(user_id, balance))))
}

/// Most recent balance movements, newest first
///
/// GET /api/v1/balances/{user_id}/history
#[instrument(skip(state, user, query))]
pub async fn get_history(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    query: web::Query<HistoryParams>,
) -> Result<HttpResponse, AppError> {
    validate_request(&*query, "History query")?;

    let user_id = path.into_inner();
    if !user.can_act_for(user_id) {
        return Err(AppError::Forbidden);
    }

    let entries: Vec<BalanceTransactionResponse> = state
        .services
        .balances
        .history(user_id, query.limit)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(entries)))
}
