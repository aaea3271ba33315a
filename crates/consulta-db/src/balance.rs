//! Balance mutation
//!
//! [`apply`] is the only code in the workspace that writes `users.balance`.
//! Repositories that move money (settlement, payments, withdrawals) call it
//! inside their own transaction so the balance change commits or rolls back
//! together with the record that caused it.

use crate::error::map_sqlx;
use consulta_core::models::{BalanceChange, BalanceOutcome};
use consulta_core::{AppError, AppResult};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::{debug, instrument};

/// Apply one signed balance change on an open transaction.
///
/// Locks the user row first, so concurrent changes for the same user
/// serialize on the database and the dedup check below sees every change
/// committed before the lock was granted.
#[instrument(skip(conn, change), fields(user_id = %change.user_id, delta = %change.delta))]
pub(crate) async fn apply(
    conn: &mut PgConnection,
    change: &BalanceChange,
) -> AppResult<BalanceOutcome> {
    let previous: Option<(Decimal,)> =
        sqlx::query_as("SELECT balance FROM users WHERE id = $1 FOR UPDATE")
            .bind(change.user_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx("lock user balance", e))?;

    let previous = previous
        .map(|row| row.0)
        .ok_or_else(|| AppError::UserNotFound(change.user_id.to_string()))?;

    if let Some(key) = &change.dedup_key {
        let seen: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM balance_transactions WHERE dedup_key = $1")
                .bind(key)
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| map_sqlx("check balance dedup key", e))?;

        if seen.is_some() {
            debug!("Balance change {} already applied", key);
            return Ok(BalanceOutcome {
                user_id: change.user_id,
                balance: previous,
                applied: false,
            });
        }
    }

    let new_balance = previous + change.delta;
    if new_balance < Decimal::ZERO {
        return Err(AppError::InsufficientBalance {
            required: (-change.delta).to_string(),
            available: previous.to_string(),
        });
    }

    sqlx::query("UPDATE users SET balance = $2, updated_at = NOW() WHERE id = $1")
        .bind(change.user_id)
        .bind(new_balance)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx("update user balance", e))?;

    sqlx::query(
        r#"
        INSERT INTO balance_transactions (
            user_id, amount, previous_balance, new_balance, kind, reason, dedup_key
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(change.user_id)
    .bind(change.delta)
    .bind(previous)
    .bind(new_balance)
    .bind(change.kind.to_string())
    .bind(&change.reason)
    .bind(&change.dedup_key)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx("append balance transaction", e))?;

    debug!(
        "Balance for {} moved {} -> {}",
        change.user_id, previous, new_balance
    );

    Ok(BalanceOutcome {
        user_id: change.user_id,
        balance: new_balance,
        applied: true,
    })
}
