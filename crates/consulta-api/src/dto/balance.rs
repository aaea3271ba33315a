//! Balance DTOs

use super::common::money;
use chrono::{DateTime, Utc};
use consulta_core::models::BalanceTransaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Current balance of a user
#[derive(Debug, Clone, Serialize)]
pub struct BalanceResponse {
    pub user_id: Uuid,
    pub balance: Decimal,
}

impl BalanceResponse {
    pub fn new(user_id: Uuid, balance: Decimal) -> Self {
        Self {
            user_id,
            balance: money(balance),
        }
    }
}

/// Balance history query parameters
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct HistoryParams {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 200))]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// One balance movement
#[derive(Debug, Clone, Serialize)]
pub struct BalanceTransactionResponse {
    pub id: i64,
    pub amount: Decimal,
    pub previous_balance: Decimal,
    pub new_balance: Decimal,
    pub kind: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl From<BalanceTransaction> for BalanceTransactionResponse {
    fn from(tx: BalanceTransaction) -> Self {
        Self {
            id: tx.id,
            amount: money(tx.amount),
            previous_balance: money(tx.previous_balance),
            new_balance: money(tx.new_balance),
            kind: tx.kind.to_string(),
            reason: tx.reason,
            created_at: tx.created_at,
        }
    }
}
