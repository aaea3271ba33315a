//! Call handlers
//!
//! HTTP handlers for the call lifecycle. Only the caller, the counselor or an
//! admin may act on a call.

use crate::dto::call::{CallCreateRequest, CallEndResponse, CallResponse, SettlementResponse};
use crate::dto::{validate_request, ApiResponse};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use consulta_auth::AuthenticatedUser;
use consulta_core::models::Call;
use consulta_core::AppError;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Load a call the user takes part in
async fn participant_call(
    state: &AppState,
    user: &AuthenticatedUser,
    call_id: Uuid,
) -> Result<Call, AppError> {
    let call = state.services.calls.get(call_id).await?;
    let is_admin = user.role.map_or(false, |r| r.is_admin());

    if call.caller_id != user.user_id && call.counselor_id != user.user_id && !is_admin {
        warn!(call_id = %call_id, user_id = %user.user_id, "Call access denied");
        return Err(AppError::Forbidden);
    }
    Ok(call)
}

/// Create a call from the authenticated caller to a counselor
///
/// POST /api/v1/calls
#[instrument(skip(state, user, req), fields(caller_id = %user.user_id))]
pub async fn create_call(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<CallCreateRequest>,
) -> Result<HttpResponse, AppError> {
    validate_request(&*req, "Call creation")?;

    let call = state
        .services
        .calls
        .create(user.user_id, req.counselor_id, req.referral_code.as_deref())
        .await?;

    info!(call_id = %call.id, "Call created via API");
    Ok(HttpResponse::Created().json(ApiResponse::success(CallResponse::from(call))))
}

/// POST /api/v1/calls/{id}/connecting
#[instrument(skip(state, user))]
pub async fn mark_connecting(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let call_id = path.into_inner();
    participant_call(&state, &user, call_id).await?;

    let call = state.services.calls.mark_connecting(call_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(CallResponse::from(call))))
}

/// POST /api/v1/calls/{id}/activate
#[instrument(skip(state, user))]
pub async fn activate_call(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let call_id = path.into_inner();
    participant_call(&state, &user, call_id).await?;

    let call = state.services.calls.transition_to_active(call_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(CallResponse::from(call))))
}

/// End a call and settle it
///
/// POST /api/v1/calls/{id}/end
///
/// Repeating the request returns the existing settlement.
#[instrument(skip(state, user))]
pub async fn end_call(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let call_id = path.into_inner();
    participant_call(&state, &user, call_id).await?;

    let result = state.services.calls.end(call_id).await?;
    debug!(
        call_id = %call_id,
        already_settled = result.already_settled,
        "Call end processed"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success(CallEndResponse::from(result))))
}

/// POST /api/v1/calls/{id}/cancel
#[instrument(skip(state, user))]
pub async fn cancel_call(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let call_id = path.into_inner();
    participant_call(&state, &user, call_id).await?;

    let call = state.services.calls.cancel(call_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(CallResponse::from(call))))
}

/// Settlement of an ended call
///
/// GET /api/v1/calls/{id}/settlement
#[instrument(skip(state, user))]
pub async fn get_settlement(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let call_id = path.into_inner();
    participant_call(&state, &user, call_id).await?;

    let summary = state
        .services
        .calls
        .settlement(call_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Settlement for call {}", call_id)))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(SettlementResponse::from(summary))))
}
