//! Withdrawal request model
//!
//! A user's request to convert balance into an external payout. Requests
//! start `PENDING` and move exactly once to a terminal state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Withdrawal status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    #[default]
    Pending,
    Rejected,
    AutoCompleted,
    ManualCompleted,
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WithdrawalStatus::Pending => write!(f, "PENDING"),
            WithdrawalStatus::Rejected => write!(f, "REJECTED"),
            WithdrawalStatus::AutoCompleted => write!(f, "AUTO_COMPLETED"),
            WithdrawalStatus::ManualCompleted => write!(f, "MANUAL_COMPLETED"),
        }
    }
}

impl WithdrawalStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(WithdrawalStatus::Pending),
            "REJECTED" => Some(WithdrawalStatus::Rejected),
            "AUTO_COMPLETED" => Some(WithdrawalStatus::AutoCompleted),
            "MANUAL_COMPLETED" => Some(WithdrawalStatus::ManualCompleted),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, WithdrawalStatus::Pending)
    }

    pub fn is_completed(&self) -> bool {
        matches!(
            self,
            WithdrawalStatus::AutoCompleted | WithdrawalStatus::ManualCompleted
        )
    }
}

/// How an approved payout was executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionMode {
    /// Transfer executed by the payout system; a transaction hash is required
    Auto,
    /// Transfer executed out of band by an operator
    Manual,
}

impl CompletionMode {
    /// Terminal status reached when approving in this mode
    pub fn completed_status(&self) -> WithdrawalStatus {
        match self {
            CompletionMode::Auto => WithdrawalStatus::AutoCompleted,
            CompletionMode::Manual => WithdrawalStatus::ManualCompleted,
        }
    }
}

/// Withdrawal request entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub user_id: Uuid,

    /// Amount debited from the balance on approval
    pub balance_amount: Decimal,

    /// Amount sent in the external payout currency
    pub payout_amount: Decimal,

    /// External destination address
    pub destination: String,

    pub network: String,

    pub status: WithdrawalStatus,

    pub rejection_reason: Option<String>,

    /// Admin who approved or rejected the request
    pub processed_by: Option<Uuid>,

    pub processed_at: Option<DateTime<Utc>>,

    pub tx_hash: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl WithdrawalRequest {
    pub fn new(
        user_id: Uuid,
        balance_amount: Decimal,
        payout_amount: Decimal,
        destination: String,
        network: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance_amount,
            payout_amount,
            destination,
            network,
            status: WithdrawalStatus::Pending,
            rejection_reason: None,
            processed_by: None,
            processed_at: None,
            tx_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Idempotency key of the balance debit made on approval
    pub fn debit_key(&self) -> String {
        format!("withdrawal:{}", self.id)
    }
}

/// Approval decision passed to the repository
#[derive(Debug, Clone)]
pub struct WithdrawalApproval {
    pub withdrawal_id: Uuid,
    pub admin_id: Uuid,
    pub mode: CompletionMode,
    pub tx_hash: Option<String>,
}

/// Rejection decision passed to the repository
#[derive(Debug, Clone)]
pub struct WithdrawalRejection {
    pub withdrawal_id: Uuid,
    pub admin_id: Uuid,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_request_is_pending() {
        let request = WithdrawalRequest::new(
            Uuid::new_v4(),
            dec!(50),
            dec!(50),
            "0xabc".to_string(),
            "TRC20".to_string(),
        );
        assert!(request.status.is_pending());
        assert!(request.processed_by.is_none());
        assert!(request.debit_key().starts_with("withdrawal:"));
    }

    #[test]
    fn test_completion_mode_status() {
        assert_eq!(
            CompletionMode::Auto.completed_status(),
            WithdrawalStatus::AutoCompleted
        );
        assert!(CompletionMode::Manual.completed_status().is_completed());
        assert!(!WithdrawalStatus::Rejected.is_completed());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            WithdrawalStatus::from_str("manual_completed"),
            Some(WithdrawalStatus::ManualCompleted)
        );
        assert_eq!(WithdrawalStatus::from_str("done"), None);
    }
}
