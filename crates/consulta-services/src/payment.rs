//! Payment provider webhook
//!
//! Each notification is authenticated with an HMAC-SHA256 signature over a
//! canonical message before anything is parsed or stored. A notification is
//! recorded once per provider transaction; completed payments credit the
//! user's balance in the same transaction as the record. A pending payment
//! is the one record that changes: its completed notification upgrades it
//! and credits it then.

use crate::audit;
use consulta_core::{
    config::PaymentsConfig,
    models::{AuditLog, PaymentOutcome, PaymentRecord, PaymentStatus},
    traits::{AuditRepository, PaymentRepository},
    AppError, AppResult,
};
use consulta_db::RetryPolicy;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Payment notification as sent by the provider
///
/// Fields stay in their wire form until the signature has been checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentWebhook {
    pub provider_tx_id: String,
    pub user_id: Uuid,
    pub amount: String,
    pub currency: String,
    pub status: String,
}

impl PaymentWebhook {
    /// `provider_tx_id|user_id|amount|currency|status`
    pub fn canonical_message(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.provider_tx_id, self.user_id, self.amount, self.currency, self.status
        )
    }
}

/// Hex HMAC-SHA256 of a notification's canonical message
pub fn sign_webhook(secret: &str, webhook: &PaymentWebhook) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("webhook key: {}", e)))?;
    mac.update(webhook.canonical_message().as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub struct PaymentService {
    payments: Arc<dyn PaymentRepository>,
    audit: Arc<dyn AuditRepository>,
    webhook_secret: String,
    credits_per_unit: Decimal,
    retry: RetryPolicy,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        audit: Arc<dyn AuditRepository>,
        config: &PaymentsConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            payments,
            audit,
            webhook_secret: config.webhook_secret.clone(),
            credits_per_unit: config.credits_per_unit,
            retry,
        }
    }

    /// Authenticate and record one notification
    #[instrument(skip(self, webhook, signature), fields(provider_tx_id = %webhook.provider_tx_id))]
    pub async fn handle_webhook(
        &self,
        webhook: &PaymentWebhook,
        signature: &str,
    ) -> AppResult<PaymentOutcome> {
        if !self.verify(webhook, signature) {
            warn!(
                "Rejected payment webhook {} with invalid signature",
                webhook.provider_tx_id
            );
            audit(
                self.audit.as_ref(),
                AuditLog::builder()
                    .action("payment.invalid_signature")
                    .entity_type("payment")
                    .entity_id(&webhook.provider_tx_id)
                    .details(json!({ "user_id": webhook.user_id })),
            )
            .await;
            return Err(AppError::InvalidSignature);
        }

        let record = self.parse(webhook)?;
        let outcome = self
            .retry
            .run("record payment", || self.payments.record_and_credit(&record))
            .await?;

        if outcome.duplicate {
            info!("Payment {} already recorded", webhook.provider_tx_id);
            return Ok(outcome);
        }

        info!(
            "Recorded {} payment {} of {} {} for {} (credit {})",
            outcome.record.status,
            outcome.record.provider_tx_id,
            outcome.record.amount,
            outcome.record.currency,
            outcome.record.user_id,
            outcome.record.credit_amount
        );
        audit(
            self.audit.as_ref(),
            AuditLog::builder()
                .actor_id(outcome.record.user_id)
                .action("payment.recorded")
                .entity_type("payment")
                .entity_id(&outcome.record.provider_tx_id)
                .details(json!({
                    "status": outcome.record.status,
                    "amount": outcome.record.amount,
                    "currency": outcome.record.currency,
                    "credit_amount": outcome.record.credit_amount,
                })),
        )
        .await;

        Ok(outcome)
    }

    pub async fn find(&self, provider_tx_id: &str) -> AppResult<Option<PaymentRecord>> {
        self.payments.find_by_provider_tx(provider_tx_id).await
    }

    fn verify(&self, webhook: &PaymentWebhook, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(self.webhook_secret.as_bytes()) else {
            return false;
        };
        mac.update(webhook.canonical_message().as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    fn parse(&self, webhook: &PaymentWebhook) -> AppResult<PaymentRecord> {
        let provider_tx_id = webhook.provider_tx_id.trim();
        if provider_tx_id.is_empty() {
            return Err(AppError::MissingField("provider_tx_id".to_string()));
        }
        let currency = webhook.currency.trim();
        if currency.is_empty() {
            return Err(AppError::MissingField("currency".to_string()));
        }

        let amount = Decimal::from_str(webhook.amount.trim())
            .map_err(|_| AppError::InvalidInput(format!("amount: {}", webhook.amount)))?;
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "payment amount must be positive, got {}",
                amount
            )));
        }

        let status = PaymentStatus::from_str(webhook.status.trim())
            .ok_or_else(|| AppError::InvalidInput(format!("status: {}", webhook.status)))?;

        let credit_amount = if status.credits_balance() {
            amount * self.credits_per_unit
        } else {
            Decimal::ZERO
        };

        Ok(PaymentRecord::new(
            webhook.user_id,
            provider_tx_id.to_string(),
            amount,
            currency.to_uppercase(),
            status,
            credit_amount,
        ))
    }
}
