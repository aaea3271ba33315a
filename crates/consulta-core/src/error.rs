//! Unified error handling for Consulta
//!
//! This module provides a single error type covering every failure scenario
//! of the settlement core, with automatic HTTP response mapping.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Storage Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    /// Storage is unreachable or temporarily refusing work (pool exhausted,
    /// I/O failure, serialization conflict). Safe to retry.
    #[error("Storage unavailable: {0}")]
    Pool(String),

    /// BEGIN or COMMIT failed for a non-transient reason
    #[error("Transaction failed: {0}")]
    Transaction(String),

    // ==================== Cache Errors ====================
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Cache connection failed: {0}")]
    CacheConnection(String),

    // ==================== Authentication Errors ====================
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: insufficient permissions")]
    Forbidden,

    #[error("Invalid signature")]
    InvalidSignature,

    // ==================== Business Logic Errors ====================
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: String, available: String },

    #[error("Call not found: {0}")]
    CallNotFound(String),

    #[error("Call {0} was never started")]
    CallNotStarted(String),

    #[error("Referral not found: {0}")]
    ReferralNotFound(String),

    #[error("Withdrawal request not found: {0}")]
    WithdrawalNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Invalid state transition: {0}")]
    InvalidState(String),

    #[error("No counselor available")]
    NoCounselorAvailable,

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    // ==================== Resource Errors ====================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation(_) | AppError::InvalidInput(_) | AppError::MissingField(_) => {
                StatusCode::BAD_REQUEST
            }

            // 401 Unauthorized
            AppError::InvalidToken(_) | AppError::TokenExpired | AppError::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }

            // 402 Payment Required
            AppError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,

            // 403 Forbidden
            AppError::Forbidden => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::CallNotFound(_)
            | AppError::ReferralNotFound(_)
            | AppError::WithdrawalNotFound(_)
            | AppError::UserNotFound(_)
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Conflict(_) | AppError::AlreadyExists(_) | AppError::InvalidState(_) => {
                StatusCode::CONFLICT
            }

            // 422 Unprocessable Entity
            AppError::CallNotStarted(_) => StatusCode::UNPROCESSABLE_ENTITY,

            // 503 Service Unavailable
            AppError::Pool(_) | AppError::CacheConnection(_) | AppError::NoCounselorAvailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "storage_unavailable",
            AppError::Transaction(_) => "transaction_error",
            AppError::Cache(_) => "cache_error",
            AppError::CacheConnection(_) => "cache_connection_error",
            AppError::TokenExpired => "token_expired",
            AppError::InvalidToken(_) => "invalid_token",
            AppError::Forbidden => "forbidden",
            AppError::InvalidSignature => "invalid_signature",
            AppError::InsufficientBalance { .. } => "insufficient_balance",
            AppError::CallNotFound(_) => "call_not_found",
            AppError::CallNotStarted(_) => "call_not_started",
            AppError::ReferralNotFound(_) => "referral_not_found",
            AppError::WithdrawalNotFound(_) => "withdrawal_not_found",
            AppError::UserNotFound(_) => "user_not_found",
            AppError::InvalidState(_) => "invalid_state",
            AppError::NoCounselorAvailable => "no_counselor_available",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::MissingField(_) => "missing_field",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }

    /// Whether the failure is an infrastructure hiccup worth retrying.
    ///
    /// Domain errors (validation, conflicts, insufficient balance) are never
    /// transient: repeating the request cannot change their outcome.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Pool(_))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
