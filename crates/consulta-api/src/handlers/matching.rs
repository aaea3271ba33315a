//! Counselor presence and matching handlers

use crate::dto::matching::{MatchRequestBody, MatchResponse, PresenceRequest, PresenceResponse};
use crate::dto::{validate_request, ApiResponse};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use consulta_auth::AuthenticatedUser;
use consulta_core::AppError;
use consulta_services::MatchRequest;
use tracing::instrument;

/// POST /api/v1/matching/presence
#[instrument(skip(state, user, req), fields(counselor_id = %user.user_id))]
pub async fn set_presence(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<PresenceRequest>,
) -> Result<HttpResponse, AppError> {
    let presence_state = state
        .services
        .matching
        .set_presence(user.user_id, req.presence)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(PresenceResponse {
        counselor_id: user.user_id,
        state: presence_state,
    })))
}

/// Claim an available counselor for the authenticated caller
///
/// POST /api/v1/matching/match
#[instrument(skip(state, user, req), fields(caller_id = %user.user_id))]
pub async fn find_match(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<MatchRequestBody>,
) -> Result<HttpResponse, AppError> {
    validate_request(&*req, "Match request")?;
    let req = req.into_inner();

    let counselor_id = state
        .services
        .matching
        .find_match(&MatchRequest {
            caller_id: user.user_id,
            preferred_counselor: req.preferred_counselor,
            exclude: req.exclude,
        })
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(MatchResponse { counselor_id })))
}
