//! Cache key constants and builders for Consulta
//!
//! Provides standardized key naming patterns for all cached entities,
//! ensuring consistency across the application and preventing key collisions.
//!
//! # Key Patterns
//!
//! - `earnings:{payee_id}` - Cached earnings summary for a payee
//! - `earnings_last:{payee_id}` - Last good summary, served while storage is down
//! - `counselors:available` - Set of counselors idle and ready for a call
//! - `counselors:busy` - Set of counselors currently claimed by a call
//! - `counselor_claim:{counselor_id}` - Owner of a busy counselor's claim
//!
//! # Example
//!
//! ```
//! use consulta_cache::keys;
//!
//! let key = keys::earnings_key("7f1c");
//! assert_eq!(key, "earnings:7f1c");
//! assert_eq!(keys::AVAILABLE_COUNSELORS_KEY, "counselors:available");
//! ```

use std::fmt::Display;

/// Prefix for cached earnings summaries
///
/// Format: `earnings:{payee_id}`
pub const EARNINGS_PREFIX: &str = "earnings";

/// Prefix for the long-lived copy of the last computed earnings summary
///
/// Format: `earnings_last:{payee_id}`
pub const EARNINGS_FALLBACK_PREFIX: &str = "earnings_last";

/// Set of counselors that announced themselves available and are not on a call
pub const AVAILABLE_COUNSELORS_KEY: &str = "counselors:available";

/// Set of counselors claimed by a caller and not yet released
pub const BUSY_COUNSELORS_KEY: &str = "counselors:busy";

/// Prefix for the owner of a counselor's claim
///
/// Format: `counselor_claim:{counselor_id}`
pub const COUNSELOR_CLAIM_PREFIX: &str = "counselor_claim";

/// TTL for a counselor claim (1 day), well past any single call
pub const COUNSELOR_CLAIM_TTL_SECS: u64 = 86400;

/// TTL for the last good earnings summary (1 day)
pub const EARNINGS_FALLBACK_TTL_SECS: u64 = 86400;

/// Build a cache key for a payee's earnings summary
///
/// # Example
///
/// ```
/// use consulta_cache::keys::earnings_key;
///
/// assert_eq!(earnings_key(42), "earnings:42");
/// ```
#[inline]
pub fn earnings_key(payee_id: impl Display) -> String {
    format!("{}:{}", EARNINGS_PREFIX, payee_id)
}

/// Build the fallback key for a payee's last good earnings summary
#[inline]
pub fn earnings_fallback_key(payee_id: impl Display) -> String {
    format!("{}:{}", EARNINGS_FALLBACK_PREFIX, payee_id)
}

/// Build the key holding who owns a counselor's claim
#[inline]
pub fn counselor_claim_key(counselor_id: impl Display) -> String {
    format!("{}:{}", COUNSELOR_CLAIM_PREFIX, counselor_id)
}
