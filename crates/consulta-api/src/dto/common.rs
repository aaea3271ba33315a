//! Common DTOs used across the API

use consulta_core::AppError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::warn;
use validator::Validate;

/// Decimal places of amounts shown to clients
const DISPLAY_SCALE: u32 = 2;

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a success response with data
    pub fn success(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    /// Create a success response with data and message
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }
}

/// Round a stored amount for presentation, half away from zero
///
/// Stored amounts keep full precision; only responses are rounded.
#[inline]
pub fn money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(DISPLAY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Run `validator` rules, mapping failures to a 400
pub fn validate_request<T: Validate>(req: &T, what: &str) -> Result<(), AppError> {
    req.validate().map_err(|e| {
        warn!("{} validation failed: {}", what, e);
        AppError::Validation(e.to_string())
    })
}
