//! Access token signing and verification
//!
//! Tokens are HS256 JWTs issued by the marketplace's identity service and
//! shared with this core through `auth.jwt_secret`. Expiry is enforced
//! without leeway.

use crate::claims::Claims;
use chrono::{Duration, Utc};
use consulta_core::config::AuthConfig;
use consulta_core::error::AppError;
use consulta_core::models::AdminRole;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, error, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct JwtService {
    /// Lifetime of issued tokens in seconds
    expiration_secs: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    /// # Examples
    ///
    /// ```
    /// use consulta_auth::JwtService;
    ///
    /// let jwt_service = JwtService::new("my-secret-key", 3600);
    /// ```
    pub fn new(secret: &str, expiration_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            expiration_secs,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, config.jwt_expiration_secs)
    }

    /// Sign `claims`. An unset `exp` becomes now plus the configured lifetime.
    pub fn create_token(&self, claims: &Claims) -> Result<String, AppError> {
        let mut claims = claims.clone();
        if claims.exp == 0 {
            claims.exp = (Utc::now() + Duration::seconds(self.expiration_secs)).timestamp();
        }

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "Failed to sign access token");
            AppError::Internal(format!("token signing failed: {}", e))
        })
    }

    /// Issue a token for a marketplace user (`role = None`) or staff member
    ///
    /// ```
    /// use consulta_auth::JwtService;
    /// use uuid::Uuid;
    ///
    /// let jwt_service = JwtService::new("secret", 3600);
    /// let user_id = Uuid::new_v4();
    /// let token = jwt_service.create_token_for_user(user_id, None)?;
    /// assert_eq!(jwt_service.validate_token(&token)?.user_id()?, user_id);
    /// # Ok::<(), consulta_core::error::AppError>(())
    /// ```
    pub fn create_token_for_user(
        &self,
        user_id: Uuid,
        role: Option<AdminRole>,
    ) -> Result<String, AppError> {
        self.create_token(&Claims::new(user_id, role))
    }

    /// Verify signature and expiry, returning the claims
    ///
    /// `TokenExpired` for an expired token, `InvalidToken` for anything else.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    debug!("Rejected expired token");
                    AppError::TokenExpired
                }
                _ => {
                    warn!(error = %e, "Rejected invalid token");
                    AppError::InvalidToken(e.to_string())
                }
            })?;

        // Subject must be a user id; catch it here rather than in every handler
        claims.user_id()?;
        Ok(claims)
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("expiration_secs", &self.expiration_secs)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "consulta-test-secret";

    #[test]
    fn test_roles_survive_round_trip() {
        let jwt_service = JwtService::new(TEST_SECRET, 3600);

        for role in [
            None,
            Some(AdminRole::Operator),
            Some(AdminRole::Finance),
            Some(AdminRole::Superadmin),
        ] {
            let user_id = Uuid::new_v4();
            let token = jwt_service.create_token_for_user(user_id, role).unwrap();
            let claims = jwt_service.validate_token(&token).unwrap();
            assert_eq!(claims.user_id().unwrap(), user_id);
            assert_eq!(claims.role, role);
        }
    }

    #[test]
    fn test_expired_token_has_no_leeway() {
        let jwt_service = JwtService::new(TEST_SECRET, 3600);

        // Just past expiry; the library default leeway would still accept it
        let claims = Claims::with_expiration(Uuid::new_v4(), None, -5);
        let token = jwt_service.create_token(&claims).unwrap();

        assert!(matches!(
            jwt_service.validate_token(&token),
            Err(AppError::TokenExpired)
        ));
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let issuer = JwtService::new("someone-else", 3600);
        let token = issuer.create_token_for_user(Uuid::new_v4(), None).unwrap();

        let jwt_service = JwtService::new(TEST_SECRET, 3600);
        assert!(matches!(
            jwt_service.validate_token(&token),
            Err(AppError::InvalidToken(_))
        ));
        assert!(matches!(
            jwt_service.validate_token("not-a-jwt"),
            Err(AppError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let jwt_service = JwtService::new(TEST_SECRET, 3600);
        let mut claims = Claims::new(Uuid::new_v4(), None);
        claims.sub = "admin".to_string();
        let token = jwt_service.create_token(&claims).unwrap();

        assert!(matches!(
            jwt_service.validate_token(&token),
            Err(AppError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_configured_lifetime_applied() {
        let jwt_service = JwtService::from_config(&AuthConfig {
            jwt_secret: TEST_SECRET.to_string(),
            jwt_expiration_secs: 900,
        });

        let token = jwt_service
            .create_token_for_user(Uuid::new_v4(), None)
            .unwrap();
        let claims = jwt_service.validate_token(&token).unwrap();

        let now = Utc::now().timestamp();
        assert!(claims.exp > now && claims.exp <= now + 900);
    }

    #[test]
    fn test_debug_hides_secret() {
        let debug_str = format!("{:?}", JwtService::new(TEST_SECRET, 3600));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains(TEST_SECRET));
    }
}
