//! Payment provider webhook

use crate::dto::payment::{PaymentResponse, PaymentWebhook, SIGNATURE_HEADER};
use crate::dto::ApiResponse;
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use consulta_core::AppError;
use tracing::{debug, instrument};

/// Record a provider payment and credit the payer
///
/// POST /api/v1/payments/webhook
///
/// Not authenticated by token; the body must carry a valid signature in the
/// `X-Signature` header. Redelivered notifications answer 200 with
/// `duplicate: true`.
#[instrument(skip(state, req, body), fields(provider_tx_id = %body.provider_tx_id))]
pub async fn payment_webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<PaymentWebhook>,
) -> Result<HttpResponse, AppError> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if signature.is_empty() {
        debug!("Webhook received without signature header");
    }

    let outcome = state
        .services
        .payments
        .handle_webhook(&body, signature)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(PaymentResponse::from(outcome))))
}
