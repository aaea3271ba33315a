//! Earnings dashboard handler

use crate::dto::earnings::EarningsResponse;
use crate::dto::ApiResponse;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use consulta_auth::AuthenticatedUser;
use consulta_core::AppError;
use tracing::instrument;
use uuid::Uuid;

/// GET /api/v1/earnings/{payee_id}
///
/// Served from cache when fresh. When storage is down the last cached summary
/// (or zeros) is returned flagged as degraded.
#[instrument(skip(state, user))]
pub async fn get_earnings(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let payee_id = path.into_inner();
    if !user.can_act_for(payee_id) {
        return Err(AppError::Forbidden);
    }

    let summary = state.services.earnings.summary(payee_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(EarningsResponse::from(summary))))
}
