//! Referral model
//!
//! Links a referrer to the user they brought in. Calls placed with an
//! active referral code pay the referrer a share of the call cost.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Length of generated referral codes
pub const REFERRAL_CODE_LEN: usize = 8;

/// Referral status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferralStatus {
    #[default]
    Active,
    Inactive,
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferralStatus::Active => write!(f, "ACTIVE"),
            ReferralStatus::Inactive => write!(f, "INACTIVE"),
        }
    }
}

impl ReferralStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Some(ReferralStatus::Active),
            "INACTIVE" => Some(ReferralStatus::Inactive),
            _ => None,
        }
    }
}

/// Referral entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referral {
    pub id: Uuid,
    pub referrer_id: Uuid,
    pub referred_id: Uuid,
    /// Unique, case-sensitive
    pub code: String,
    pub status: ReferralStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Referral {
    pub fn new(referrer_id: Uuid, referred_id: Uuid, code: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            referrer_id,
            referred_id,
            code,
            status: ReferralStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == ReferralStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_referral_is_active() {
        let referral = Referral::new(Uuid::new_v4(), Uuid::new_v4(), "AB12CD34".to_string());
        assert!(referral.is_active());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(ReferralStatus::from_str("inactive"), Some(ReferralStatus::Inactive));
        assert_eq!(ReferralStatus::from_str("ACTIVE"), Some(ReferralStatus::Active));
        assert_eq!(ReferralStatus::from_str("banned"), None);
    }
}
