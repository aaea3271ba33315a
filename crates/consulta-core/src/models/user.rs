//! Roles and permissions
//!
//! Back-office roles carried in access tokens, and the table that decides
//! which roles may perform each guarded operation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Back-office role
///
/// Marketplace users (callers, counselors) carry no role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminRole {
    /// Moderation: referral status, user support
    Operator,
    /// Payout processing
    Finance,
    /// Full access to most features
    Admin,
    /// System-wide access
    Superadmin,
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminRole::Operator => write!(f, "operator"),
            AdminRole::Finance => write!(f, "finance"),
            AdminRole::Admin => write!(f, "admin"),
            AdminRole::Superadmin => write!(f, "superadmin"),
        }
    }
}

impl AdminRole {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "operator" => Some(AdminRole::Operator),
            "finance" => Some(AdminRole::Finance),
            "admin" => Some(AdminRole::Admin),
            "superadmin" => Some(AdminRole::Superadmin),
            _ => None,
        }
    }

    /// Check if role has admin privileges
    pub fn is_admin(&self) -> bool {
        matches!(self, AdminRole::Admin | AdminRole::Superadmin)
    }
}

/// Guarded operation class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Approve or reject withdrawals
    ManagePayouts,
    /// Change referral status
    ModerateReferrals,
}

impl Permission {
    /// Roles allowed to exercise this permission
    pub fn allowed_roles(&self) -> &'static [AdminRole] {
        match self {
            Permission::ManagePayouts => &[
                AdminRole::Finance,
                AdminRole::Admin,
                AdminRole::Superadmin,
            ],
            Permission::ModerateReferrals => &[
                AdminRole::Operator,
                AdminRole::Admin,
                AdminRole::Superadmin,
            ],
        }
    }

    /// Check whether `role` may exercise this permission
    pub fn allows(&self, role: Option<AdminRole>) -> bool {
        role.map_or(false, |r| self.allowed_roles().contains(&r))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::ManagePayouts => write!(f, "manage_payouts"),
            Permission::ModerateReferrals => write!(f, "moderate_referrals"),
        }
    }
}
