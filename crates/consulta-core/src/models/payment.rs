//! Inbound payment model
//!
//! A payment notification received from the payment provider, recorded once
//! per provider transaction id.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Payment status as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Completed,
    Pending,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl PaymentStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "completed" => Some(PaymentStatus::Completed),
            "pending" => Some(PaymentStatus::Pending),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    /// Only completed payments move money into a balance
    pub fn credits_balance(&self) -> bool {
        matches!(self, PaymentStatus::Completed)
    }

    /// A recorded payment may move from `self` to `next` on a later
    /// notification. Only pending payments change, and only to completed.
    pub fn can_upgrade_to(&self, next: PaymentStatus) -> bool {
        matches!((self, next), (PaymentStatus::Pending, PaymentStatus::Completed))
    }
}

/// Recorded payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Unique per provider transaction
    pub provider_tx_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    /// Balance units credited; zero unless `status` is completed
    pub credit_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn new(
        user_id: Uuid,
        provider_tx_id: String,
        amount: Decimal,
        currency: String,
        status: PaymentStatus,
        credit_amount: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            provider_tx_id,
            amount,
            currency,
            status,
            credit_amount,
            created_at: Utc::now(),
        }
    }

    /// Idempotency key of the balance credit made for this payment
    pub fn credit_key(&self) -> String {
        format!("payment:{}", self.provider_tx_id)
    }
}

/// Result of recording a payment
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub record: PaymentRecord,
    /// True when the provider transaction had already been recorded and
    /// this notification changed nothing
    pub duplicate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_only_completed_credits() {
        assert!(PaymentStatus::Completed.credits_balance());
        assert!(!PaymentStatus::Pending.credits_balance());
        assert!(!PaymentStatus::Failed.credits_balance());
    }

    #[test]
    fn test_credit_key_uses_provider_id() {
        let record = PaymentRecord::new(
            Uuid::new_v4(),
            "tx-42".to_string(),
            dec!(10),
            "USD".to_string(),
            PaymentStatus::Completed,
            dec!(10),
        );
        assert_eq!(record.credit_key(), "payment:tx-42");
    }

    #[test]
    fn test_only_pending_upgrades_to_completed() {
        assert!(PaymentStatus::Pending.can_upgrade_to(PaymentStatus::Completed));
        assert!(!PaymentStatus::Pending.can_upgrade_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Failed.can_upgrade_to(PaymentStatus::Completed));
        assert!(!PaymentStatus::Completed.can_upgrade_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Completed.can_upgrade_to(PaymentStatus::Completed));
    }
}
