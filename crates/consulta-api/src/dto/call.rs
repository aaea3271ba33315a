//! Call DTOs
//!
//! Request and response types for call lifecycle endpoints.

use super::common::money;
use chrono::{DateTime, Utc};
use consulta_core::models::{Call, SettlementSummary};
use consulta_services::CallEndResult;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Call creation request; the caller is the authenticated user
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CallCreateRequest {
    /// Counselor to call
    pub counselor_id: Uuid,

    /// Optional referral code; unknown or inactive codes are ignored
    #[validate(length(max = 32, message = "Referral code is too long"))]
    pub referral_code: Option<String>,
}

/// Call response
#[derive(Debug, Clone, Serialize)]
pub struct CallResponse {
    pub id: Uuid,
    pub caller_id: Uuid,
    pub counselor_id: Uuid,
    pub referral_id: Option<Uuid>,
    pub status: String,
    pub channel_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub cost: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Call> for CallResponse {
    fn from(call: Call) -> Self {
        Self {
            id: call.id,
            caller_id: call.caller_id,
            counselor_id: call.counselor_id,
            referral_id: call.referral_id,
            status: call.status.to_string(),
            channel_id: call.channel_id,
            started_at: call.started_at,
            ended_at: call.ended_at,
            duration_seconds: call.duration_seconds,
            cost: call.cost.map(money),
            created_at: call.created_at,
            updated_at: call.updated_at,
        }
    }
}

/// Per-party settlement amounts of one call
#[derive(Debug, Clone, Serialize)]
pub struct SettlementResponse {
    pub call_id: Uuid,
    pub total_cost: Decimal,
    pub counselor: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<Decimal>,
    pub company: Decimal,
    pub has_referrer: bool,
}

impl From<SettlementSummary> for SettlementResponse {
    fn from(summary: SettlementSummary) -> Self {
        Self {
            call_id: summary.call_id,
            total_cost: money(summary.total_cost),
            counselor: money(summary.counselor),
            referrer: summary.referrer.map(money),
            company: money(summary.company),
            has_referrer: summary.has_referrer,
        }
    }
}

/// Result of ending a call
#[derive(Debug, Clone, Serialize)]
pub struct CallEndResponse {
    pub call: CallResponse,
    /// Null for cancelled calls
    pub settlement: Option<SettlementResponse>,
    pub already_settled: bool,
}

impl From<CallEndResult> for CallEndResponse {
    fn from(result: CallEndResult) -> Self {
        Self {
            call: result.call.into(),
            settlement: result.settlement.map(Into::into),
            already_settled: result.already_settled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_settlement_response_rounds_amounts() {
        let response = SettlementResponse::from(SettlementSummary {
            call_id: Uuid::nil(),
            total_cost: dec!(0.1423333333),
            counselor: dec!(0.0854),
            referrer: None,
            company: dec!(0.0569333333),
            has_referrer: false,
        });
        assert_eq!(response.total_cost, dec!(0.14));
        assert_eq!(response.counselor, dec!(0.09));
        assert_eq!(response.company, dec!(0.06));
        assert!(response.referrer.is_none());
    }

    #[test]
    fn test_settlement_body_field_names() {
        let body = serde_json::to_value(SettlementResponse::from(SettlementSummary {
            call_id: Uuid::nil(),
            total_cost: dec!(1.4),
            counselor: dec!(0.84),
            referrer: Some(dec!(0.14)),
            company: dec!(0.42),
            has_referrer: true,
        }))
        .unwrap();

        for field in ["total_cost", "counselor", "referrer", "company", "has_referrer"] {
            assert!(body.get(field).is_some(), "missing {}", field);
        }
        assert!(body.get("counselor_amount").is_none());
    }

    #[test]
    fn test_create_request_validation() {
        let req = CallCreateRequest {
            counselor_id: Uuid::new_v4(),
            referral_code: Some("X".repeat(40)),
        };
        assert!(req.validate().is_err());

        let req = CallCreateRequest {
            counselor_id: Uuid::new_v4(),
            referral_code: None,
        };
        assert!(req.validate().is_ok());
    }
}
