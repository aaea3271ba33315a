//! Payment webhook DTOs

use super::common::money;
use consulta_core::models::PaymentOutcome;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

pub use consulta_services::PaymentWebhook;

/// Header carrying the hex HMAC-SHA256 signature of a webhook
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Recorded payment
#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub provider_tx_id: String,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub credit_amount: Decimal,
    /// True when this provider transaction had already been recorded
    pub duplicate: bool,
}

impl From<PaymentOutcome> for PaymentResponse {
    fn from(outcome: PaymentOutcome) -> Self {
        let record = outcome.record;
        Self {
            id: record.id,
            provider_tx_id: record.provider_tx_id,
            user_id: record.user_id,
            amount: money(record.amount),
            currency: record.currency,
            status: record.status.to_string(),
            credit_amount: money(record.credit_amount),
            duplicate: outcome.duplicate,
        }
    }
}
