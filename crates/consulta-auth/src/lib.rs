//! Authentication and authorization for Consulta
//!
//! This crate provides JWT-based authentication and an Actix-web extractor
//! that enforces the access level each route declares.
//!
//! # Examples
//!
//! ## Creating a JWT token
//!
//! ```no_run
//! use consulta_auth::{Claims, JwtService};
//! use consulta_core::models::AdminRole;
//! use uuid::Uuid;
//!
//! let jwt_service = JwtService::new("your-secret-key", 3600);
//! let claims = Claims::new(Uuid::new_v4(), Some(AdminRole::Finance));
//! let token = jwt_service.create_token(&claims)?;
//! # Ok::<(), consulta_core::error::AppError>(())
//! ```
//!
//! ## Guarding a resource
//!
//! ```no_run
//! use actix_web::{web, HttpResponse};
//! use consulta_auth::{Access, AuthenticatedUser};
//! use consulta_core::models::Permission;
//!
//! async fn approve(user: AuthenticatedUser) -> HttpResponse {
//!     HttpResponse::Ok().finish()
//! }
//!
//! let resource = web::resource("/withdrawals/{id}/approve")
//!     .app_data(Access::Requires(Permission::ManagePayouts))
//!     .route(web::post().to(approve));
//! ```

pub mod claims;
pub mod jwt;
pub mod middleware;

pub use claims::Claims;
pub use jwt::JwtService;
pub use middleware::{Access, AuthenticatedUser};
