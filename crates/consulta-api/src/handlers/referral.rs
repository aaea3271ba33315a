//! Referral handlers

use crate::dto::referral::{
    ReferralCreateRequest, ReferralEarningsResponse, ReferralResponse, ReferralStatusRequest,
};
use crate::dto::ApiResponse;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use consulta_auth::AuthenticatedUser;
use consulta_core::AppError;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Create a referral; the referrer defaults to the authenticated user
///
/// POST /api/v1/referrals
#[instrument(skip(state, user, req))]
pub async fn create_referral(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<ReferralCreateRequest>,
) -> Result<HttpResponse, AppError> {
    let referrer_id = req.referrer_id.unwrap_or(user.user_id);
    if !user.can_act_for(referrer_id) {
        warn!(
            user_id = %user.user_id,
            referrer_id = %referrer_id,
            "Referral on behalf of another user denied"
        );
        return Err(AppError::Forbidden);
    }

    let referral = state
        .services
        .referrals
        .create(referrer_id, req.referred_id)
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::success(ReferralResponse::from(referral))))
}

/// PUT /api/v1/referrals/{id}/status
#[instrument(skip(state, user, req))]
pub async fn set_referral_status(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    req: web::Json<ReferralStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let referral = state
        .services
        .referrals
        .set_status(path.into_inner(), req.status, user.user_id)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(ReferralResponse::from(referral))))
}

/// Per-code earnings of a referrer
///
/// GET /api/v1/referrals/earnings/{referrer_id}
#[instrument(skip(state, user))]
pub async fn referral_earnings(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let referrer_id = path.into_inner();
    if !user.can_act_for(referrer_id) {
        return Err(AppError::Forbidden);
    }

    let earnings: Vec<ReferralEarningsResponse> = state
        .services
        .referrals
        .earnings(referrer_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(earnings)))
}
