//! JWT Claims structure
//!
//! Defines the claims structure used in access tokens. Marketplace users
//! (callers, counselors) carry no role; back-office staff carry one.

use chrono::{Duration, Utc};
use consulta_core::error::AppError;
use consulta_core::models::{AdminRole, Permission};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// Back-office role, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<AdminRole>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Create new claims for a user. Expiration is set by `JwtService`.
    ///
    /// # Examples
    ///
    /// ```
    /// use consulta_auth::Claims;
    /// use consulta_core::models::AdminRole;
    /// use uuid::Uuid;
    ///
    /// let id = Uuid::new_v4();
    /// let claims = Claims::new(id, Some(AdminRole::Finance));
    /// assert_eq!(claims.user_id().unwrap(), id);
    /// ```
    pub fn new(user_id: Uuid, role: Option<AdminRole>) -> Self {
        Self {
            sub: user_id.to_string(),
            role,
            iat: Utc::now().timestamp(),
            exp: 0,
        }
    }

    /// Create new claims with a custom expiration
    pub fn with_expiration(user_id: Uuid, role: Option<AdminRole>, expires_in_secs: i64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::seconds(expires_in_secs);

        Self {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }

    /// Parse the subject as a user id
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::InvalidToken(format!("subject is not a user id: {}", self.sub)))
    }

    pub fn role(&self) -> Option<AdminRole> {
        self.role
    }

    /// Check whether the token's role grants `permission`
    pub fn has_permission(&self, permission: Permission) -> bool {
        permission.allows(self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let id = Uuid::new_v4();
        let claims = Claims::new(id, None);
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.role, None);
        assert!(claims.iat > 0);
    }

    #[test]
    fn test_claims_with_expiration() {
        let claims = Claims::with_expiration(Uuid::new_v4(), Some(AdminRole::Admin), 3600);
        assert!(!claims.is_expired());

        let now = Utc::now().timestamp();
        assert!(claims.exp > now);
        assert!(claims.exp <= now + 3600);
    }

    #[test]
    fn test_expired_claims() {
        let mut claims = Claims::new(Uuid::new_v4(), None);
        claims.exp = (Utc::now() - Duration::hours(1)).timestamp();
        assert!(claims.is_expired());
    }

    #[test]
    fn test_malformed_subject() {
        let mut claims = Claims::new(Uuid::new_v4(), None);
        claims.sub = "alice".to_string();
        assert!(matches!(claims.user_id(), Err(AppError::InvalidToken(_))));
    }

    #[test]
    fn test_permission_checks() {
        let finance = Claims::new(Uuid::new_v4(), Some(AdminRole::Finance));
        assert!(finance.has_permission(Permission::ManagePayouts));
        assert!(!finance.has_permission(Permission::ModerateReferrals));

        let caller = Claims::new(Uuid::new_v4(), None);
        assert!(!caller.has_permission(Permission::ManagePayouts));

        let superadmin = Claims::new(Uuid::new_v4(), Some(AdminRole::Superadmin));
        assert!(superadmin.has_permission(Permission::ManagePayouts));
        assert!(superadmin.has_permission(Permission::ModerateReferrals));
    }

    #[test]
    fn test_roleless_claims_omit_role_field() {
        let claims = Claims::new(Uuid::new_v4(), None);
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("role").is_none());
    }
}
