//! Referral DTOs

use super::common::money;
use chrono::{DateTime, Utc};
use consulta_core::models::{Referral, ReferralEarnings, ReferralStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Referral creation request
#[derive(Debug, Clone, Deserialize)]
pub struct ReferralCreateRequest {
    /// User being referred
    pub referred_id: Uuid,

    /// Defaults to the authenticated user; admins may create on behalf of others
    pub referrer_id: Option<Uuid>,
}

/// Referral status change
#[derive(Debug, Clone, Deserialize)]
pub struct ReferralStatusRequest {
    pub status: ReferralStatus,
}

/// Referral response
#[derive(Debug, Clone, Serialize)]
pub struct ReferralResponse {
    pub id: Uuid,
    pub referrer_id: Uuid,
    pub referred_id: Uuid,
    pub code: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Referral> for ReferralResponse {
    fn from(referral: Referral) -> Self {
        Self {
            id: referral.id,
            referrer_id: referral.referrer_id,
            referred_id: referral.referred_id,
            code: referral.code,
            status: referral.status.to_string(),
            created_at: referral.created_at,
            updated_at: referral.updated_at,
        }
    }
}

/// Earnings of one referral code
#[derive(Debug, Clone, Serialize)]
pub struct ReferralEarningsResponse {
    pub referral_code: String,
    pub total_earnings: Decimal,
    pub total_calls: i64,
}

impl From<ReferralEarnings> for ReferralEarningsResponse {
    fn from(earnings: ReferralEarnings) -> Self {
        Self {
            referral_code: earnings.referral_code,
            total_earnings: money(earnings.total_earnings),
            total_calls: earnings.total_calls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_request_parses_uppercase() {
        let req: ReferralStatusRequest = serde_json::from_str(r#"{"status": "INACTIVE"}"#).unwrap();
        assert_eq!(req.status, ReferralStatus::Inactive);
        assert!(serde_json::from_str::<ReferralStatusRequest>(r#"{"status": "gone"}"#).is_err());
    }
}
