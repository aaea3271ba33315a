//! Balance transaction model
//!
//! Append-only log of every balance mutation. The user's balance column is
//! always the running total of these rows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Source of a balance mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceKind {
    /// Payee share of an ended call
    Settlement,
    /// Completed inbound payment
    Payment,
    /// Approved withdrawal
    Withdrawal,
    /// Manual credit or debit
    Adjustment,
}

impl fmt::Display for BalanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceKind::Settlement => write!(f, "settlement"),
            BalanceKind::Payment => write!(f, "payment"),
            BalanceKind::Withdrawal => write!(f, "withdrawal"),
            BalanceKind::Adjustment => write!(f, "adjustment"),
        }
    }
}

impl BalanceKind {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "settlement" => Some(BalanceKind::Settlement),
            "payment" => Some(BalanceKind::Payment),
            "withdrawal" => Some(BalanceKind::Withdrawal),
            "adjustment" => Some(BalanceKind::Adjustment),
            _ => None,
        }
    }
}

/// One applied balance mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceTransaction {
    pub id: i64,
    pub user_id: Uuid,
    /// Signed: positive for credits, negative for debits
    pub amount: Decimal,
    pub previous_balance: Decimal,
    pub new_balance: Decimal,
    pub kind: BalanceKind,
    pub reason: String,
    /// Unique when present
    pub dedup_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A requested balance mutation
#[derive(Debug, Clone)]
pub struct BalanceChange {
    pub user_id: Uuid,
    /// Signed delta
    pub delta: Decimal,
    pub kind: BalanceKind,
    pub reason: String,
    pub dedup_key: Option<String>,
}

impl BalanceChange {
    pub fn credit(
        user_id: Uuid,
        amount: Decimal,
        kind: BalanceKind,
        reason: impl Into<String>,
        dedup_key: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            delta: amount,
            kind,
            reason: reason.into(),
            dedup_key: Some(dedup_key.into()),
        }
    }

    pub fn debit(
        user_id: Uuid,
        amount: Decimal,
        kind: BalanceKind,
        reason: impl Into<String>,
        dedup_key: Option<String>,
    ) -> Self {
        Self {
            user_id,
            delta: -amount,
            kind,
            reason: reason.into(),
            dedup_key,
        }
    }
}

/// Result of a credit or debit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceOutcome {
    pub user_id: Uuid,
    pub balance: Decimal,
    /// False when the dedup key had already been applied
    pub applied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_debit_is_negative_delta() {
        let change = BalanceChange::debit(
            Uuid::new_v4(),
            dec!(5),
            BalanceKind::Adjustment,
            "fee",
            None,
        );
        assert_eq!(change.delta, dec!(-5));

        let change = BalanceChange::credit(
            Uuid::new_v4(),
            dec!(5),
            BalanceKind::Payment,
            "top-up",
            "payment:1",
        );
        assert_eq!(change.delta, dec!(5));
        assert_eq!(change.dedup_key.as_deref(), Some("payment:1"));
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(BalanceKind::from_str("Withdrawal"), Some(BalanceKind::Withdrawal));
        assert_eq!(BalanceKind::from_str("refund"), None);
    }
}
