//! Actix-web authentication extractor and route access levels
//!
//! Each route declares an [`Access`] level in the registration table, which
//! attaches it to the resource as app data. [`AuthenticatedUser`] validates
//! the bearer token and then enforces whatever level the matched resource
//! carries, so permissions live next to the routes instead of in handlers.

use crate::jwt::JwtService;
use crate::Claims;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use consulta_core::error::AppError;
use consulta_core::models::{AdminRole, Permission};
use futures::future::{ready, Ready};
use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Access level required by a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No credentials
    Public,
    /// Request body carries its own signature, checked by the handler's service
    Signed,
    /// Any valid access token
    Authenticated,
    /// Valid access token whose role grants the permission
    Requires(Permission),
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Public => write!(f, "public"),
            Access::Signed => write!(f, "signed"),
            Access::Authenticated => write!(f, "authenticated"),
            Access::Requires(p) => write!(f, "{}", p),
        }
    }
}

/// Extract the bearer token from the Authorization header
fn extract_token_from_request(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authenticated user extractor
///
/// # Examples
///
/// ```no_run
/// use actix_web::HttpResponse;
/// use consulta_auth::AuthenticatedUser;
///
/// async fn protected_handler(user: AuthenticatedUser) -> HttpResponse {
///     HttpResponse::Ok().json(serde_json::json!({ "user_id": user.user_id }))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Option<AdminRole>,
    /// Full claims from the JWT token
    pub claims: Claims,
}

impl AuthenticatedUser {
    pub fn has_permission(&self, permission: Permission) -> bool {
        permission.allows(self.role)
    }

    /// Whether the user is acting on their own account or holds an admin role
    pub fn can_act_for(&self, user_id: Uuid) -> bool {
        self.user_id == user_id || self.role.map_or(false, |r| r.is_admin())
    }

    fn authenticate(req: &HttpRequest) -> Result<Self, AppError> {
        let jwt_service = req.app_data::<web::Data<JwtService>>().ok_or_else(|| {
            warn!("JwtService not found in app data");
            AppError::Internal("Authentication service not configured".to_string())
        })?;

        let token = extract_token_from_request(req).ok_or_else(|| {
            debug!("No authentication token found in request");
            AppError::InvalidToken("No authentication token provided".to_string())
        })?;

        let claims = jwt_service.validate_token(token)?;
        let user_id = claims.user_id()?;

        let user = AuthenticatedUser {
            user_id,
            role: claims.role,
            claims,
        };

        if let Some(Access::Requires(permission)) = req.app_data::<Access>().copied() {
            if !user.has_permission(permission) {
                warn!(
                    user_id = %user.user_id,
                    role = ?user.role,
                    permission = %permission,
                    "Access denied"
                );
                return Err(AppError::Forbidden);
            }
        }

        debug!(user_id = %user.user_id, role = ?user.role, "User authenticated");
        Ok(user)
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::authenticate(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App, HttpResponse};

    fn create_test_jwt_service() -> web::Data<JwtService> {
        web::Data::new(JwtService::new("test-secret-key-12345", 3600))
    }

    async fn whoami(user: AuthenticatedUser) -> HttpResponse {
        HttpResponse::Ok().body(user.user_id.to_string())
    }

    #[actix_web::test]
    async fn test_extract_token_from_authorization_header() {
        let jwt_service = create_test_jwt_service();
        let user_id = Uuid::new_v4();
        let token = jwt_service.create_token_for_user(user_id, None).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(jwt_service)
                .route("/test", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/test")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();

        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, user_id.to_string().as_bytes());
    }

    #[actix_web::test]
    async fn test_missing_token() {
        let app = test::init_service(
            App::new()
                .app_data(create_test_jwt_service())
                .route("/test", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get().uri("/test").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_invalid_token() {
        let app = test::init_service(
            App::new()
                .app_data(create_test_jwt_service())
                .route("/test", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/test")
            .insert_header(("Authorization", "Bearer invalid.token.here"))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_resource_permission_enforced() {
        let jwt_service = create_test_jwt_service();
        let finance = jwt_service
            .create_token_for_user(Uuid::new_v4(), Some(AdminRole::Finance))
            .unwrap();
        let operator = jwt_service
            .create_token_for_user(Uuid::new_v4(), Some(AdminRole::Operator))
            .unwrap();

        let app = test::init_service(
            App::new().app_data(jwt_service).service(
                web::resource("/payouts")
                    .app_data(Access::Requires(Permission::ManagePayouts))
                    .route(web::post().to(whoami)),
            ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/payouts")
            .insert_header(("Authorization", format!("Bearer {}", finance)))
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());

        let req = test::TestRequest::post()
            .uri("/payouts")
            .insert_header(("Authorization", format!("Bearer {}", operator)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);
    }

    #[::core::prelude::v1::test]
    fn test_can_act_for() {
        let own_id = Uuid::new_v4();
        let claims = Claims::new(own_id, None);
        let user = AuthenticatedUser {
            user_id: own_id,
            role: None,
            claims,
        };
        assert!(user.can_act_for(own_id));
        assert!(!user.can_act_for(Uuid::new_v4()));

        let admin = AuthenticatedUser {
            role: Some(AdminRole::Admin),
            ..user
        };
        assert!(admin.can_act_for(Uuid::new_v4()));
    }

    #[::core::prelude::v1::test]
    fn test_access_display() {
        assert_eq!(Access::Authenticated.to_string(), "authenticated");
        assert_eq!(
            Access::Requires(Permission::ManagePayouts).to_string(),
            "manage_payouts"
        );
    }
}
