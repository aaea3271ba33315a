//! Balance repository implementation
//!
//! Reads balances and the transaction log; writes go through
//! [`crate::balance::apply`] in a transaction of their own.

use crate::balance;
use crate::error::{begin_failed, commit_failed, map_sqlx};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consulta_core::{
    models::{BalanceChange, BalanceKind, BalanceOutcome, BalanceTransaction},
    traits::BalanceRepository,
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{instrument, warn};
use uuid::Uuid;

/// PostgreSQL implementation of BalanceRepository
pub struct PgBalanceRepository {
    pool: PgPool,
}

impl PgBalanceRepository {
    /// Create a new balance repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BalanceRepository for PgBalanceRepository {
    #[instrument(skip(self))]
    async fn balance(&self, user_id: Uuid) -> AppResult<Decimal> {
        let row: Option<(Decimal,)> = sqlx::query_as("SELECT balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("read balance", e))?;

        row.map(|r| r.0)
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))
    }

    #[instrument(skip(self, change), fields(user_id = %change.user_id))]
    async fn apply(&self, change: &BalanceChange) -> AppResult<BalanceOutcome> {
        let mut tx = self.pool.begin().await.map_err(begin_failed)?;
        let outcome = balance::apply(&mut tx, change).await?;
        tx.commit().await.map_err(commit_failed)?;
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn history(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<BalanceTransaction>> {
        let rows = sqlx::query_as::<sqlx::Postgres, BalanceTransactionRow>(
            r#"
            SELECT
                id, user_id, amount, previous_balance, new_balance,
                kind, reason, dedup_key, created_at
            FROM balance_transactions
            WHERE user_id = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("balance history", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BalanceTransactionRow {
    id: i64,
    user_id: Uuid,
    amount: Decimal,
    previous_balance: Decimal,
    new_balance: Decimal,
    kind: String,
    reason: String,
    dedup_key: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<BalanceTransactionRow> for BalanceTransaction {
    fn from(row: BalanceTransactionRow) -> Self {
        let kind = BalanceKind::from_str(&row.kind).unwrap_or_else(|| {
            warn!("Unknown balance kind '{}' on row {}", row.kind, row.id);
            BalanceKind::Adjustment
        });

        BalanceTransaction {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            previous_balance: row.previous_balance,
            new_balance: row.new_balance,
            kind,
            reason: row.reason,
            dedup_key: row.dedup_key,
            created_at: row.created_at,
        }
    }
}
