//! Withdrawal DTOs
//!
//! Request and response types for withdrawal and payout endpoints.

use super::common::money;
use chrono::{DateTime, Utc};
use consulta_core::models::{CompletionMode, WithdrawalRequest};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Withdrawal request; the requester is the authenticated user
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WithdrawalCreateRequest {
    /// Balance amount to withdraw (minimum enforced by the service)
    pub amount: Decimal,

    /// External destination address
    #[validate(length(min = 1, max = 128, message = "Destination is required"))]
    pub destination: String,

    /// Payout network
    #[validate(length(min = 1, max = 32, message = "Network is required"))]
    pub network: String,
}

/// Approval of a pending request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WithdrawalApproveRequest {
    pub mode: CompletionMode,

    /// Required when `mode` is `auto`
    #[validate(length(max = 128))]
    pub tx_hash: Option<String>,
}

/// Rejection of a pending request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WithdrawalRejectRequest {
    #[validate(length(min = 1, max = 500, message = "Reason is required"))]
    pub reason: String,
}

/// Withdrawal response
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance_amount: Decimal,
    pub payout_amount: Decimal,
    pub destination: String,
    pub network: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<WithdrawalRequest> for WithdrawalResponse {
    fn from(w: WithdrawalRequest) -> Self {
        Self {
            id: w.id,
            user_id: w.user_id,
            balance_amount: money(w.balance_amount),
            payout_amount: money(w.payout_amount),
            destination: w.destination,
            network: w.network,
            status: w.status.to_string(),
            rejection_reason: w.rejection_reason,
            processed_by: w.processed_by,
            processed_at: w.processed_at,
            tx_hash: w.tx_hash,
            created_at: w.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_create_request_validation() {
        let req = WithdrawalCreateRequest {
            amount: dec!(20),
            destination: String::new(),
            network: "TRC20".to_string(),
        };
        assert!(req.validate().is_err());

        // Note: amount bounds are enforced by the withdrawal service
        let req = WithdrawalCreateRequest {
            amount: dec!(-1),
            destination: "wallet".to_string(),
            network: "TRC20".to_string(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_approve_request_parses_mode() {
        let req: WithdrawalApproveRequest =
            serde_json::from_str(r#"{"mode": "auto", "tx_hash": "0xabc"}"#).unwrap();
        assert_eq!(req.mode, CompletionMode::Auto);

        let req: WithdrawalApproveRequest = serde_json::from_str(r#"{"mode": "manual"}"#).unwrap();
        assert!(req.tx_hash.is_none());
    }
}
