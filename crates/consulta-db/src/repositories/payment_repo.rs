//! Payment record repository implementation
//!
//! The unique `provider_tx_id` is the replay guard: the insert uses
//! `ON CONFLICT DO NOTHING`, and only the transaction that inserted the
//! record credits the balance. A stored pending payment is the exception:
//! a later completed notification updates it in place and credits it under
//! the same dedup key.

use crate::balance;
use crate::error::{begin_failed, commit_failed, map_sqlx};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consulta_core::{
    models::{BalanceChange, BalanceKind, PaymentOutcome, PaymentRecord, PaymentStatus},
    traits::PaymentRepository,
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// PostgreSQL implementation of PaymentRepository
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    /// Create a new payment repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    #[instrument(skip(self, record), fields(provider_tx_id = %record.provider_tx_id))]
    async fn record_and_credit(&self, record: &PaymentRecord) -> AppResult<PaymentOutcome> {
        let mut tx = self.pool.begin().await.map_err(begin_failed)?;

        let inserted = sqlx::query_as::<sqlx::Postgres, PaymentRow>(
            r#"
            INSERT INTO payment_records (
                id, user_id, provider_tx_id, amount, currency, status, credit_amount, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (provider_tx_id) DO NOTHING
            RETURNING
                id, user_id, provider_tx_id, amount, currency, status, credit_amount, created_at
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.provider_tx_id)
        .bind(record.amount)
        .bind(&record.currency)
        .bind(record.status.to_string())
        .bind(record.credit_amount)
        .bind(record.created_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx("insert payment record", e))?;

        let stored: PaymentRecord = match inserted {
            Some(row) => row.into(),
            None => match upgrade_pending(&mut tx, record).await? {
                Some(upgraded) => {
                    info!(
                        "Payment {} upgraded to {}",
                        upgraded.provider_tx_id, upgraded.status
                    );
                    upgraded
                }
                None => {
                    drop(tx);
                    warn!("Duplicate payment {}", record.provider_tx_id);
                    let existing = self
                        .find_by_provider_tx(&record.provider_tx_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::Conflict(format!(
                                "payment {} conflicted but is not stored",
                                record.provider_tx_id
                            ))
                        })?;
                    return Ok(PaymentOutcome {
                        record: existing,
                        duplicate: true,
                    });
                }
            },
        };

        if stored.status.credits_balance() && stored.credit_amount > Decimal::ZERO {
            let change = BalanceChange::credit(
                stored.user_id,
                stored.credit_amount,
                BalanceKind::Payment,
                format!("payment {} {}", stored.amount, stored.currency),
                stored.credit_key(),
            );
            balance::apply(&mut tx, &change).await?;
        }

        tx.commit().await.map_err(commit_failed)?;

        info!(
            "Recorded payment {} ({}) crediting {}",
            stored.provider_tx_id, stored.status, stored.credit_amount
        );

        Ok(PaymentOutcome {
            record: stored,
            duplicate: false,
        })
    }

    #[instrument(skip(self))]
    async fn find_by_provider_tx(&self, provider_tx_id: &str) -> AppResult<Option<PaymentRecord>> {
        let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(
            r#"
            SELECT id, user_id, provider_tx_id, amount, currency, status, credit_amount, created_at
            FROM payment_records
            WHERE provider_tx_id = $1
            "#,
        )
        .bind(provider_tx_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("find payment record", e))?;

        Ok(row.map(Into::into))
    }
}

/// Flip a stored pending payment to the incoming crediting status
///
/// `None` when there is nothing to upgrade: the status change is not legal,
/// the stored record already moved on, or it belongs to another user.
async fn upgrade_pending(
    conn: &mut PgConnection,
    record: &PaymentRecord,
) -> AppResult<Option<PaymentRecord>> {
    if !PaymentStatus::Pending.can_upgrade_to(record.status) {
        return Ok(None);
    }

    let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(
        r#"
        UPDATE payment_records
        SET status = $2, amount = $3, currency = $4, credit_amount = $5
        WHERE provider_tx_id = $1 AND user_id = $6 AND status = $7
        RETURNING
            id, user_id, provider_tx_id, amount, currency, status, credit_amount, created_at
        "#,
    )
    .bind(&record.provider_tx_id)
    .bind(record.status.to_string())
    .bind(record.amount)
    .bind(&record.currency)
    .bind(record.credit_amount)
    .bind(record.user_id)
    .bind(PaymentStatus::Pending.to_string())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_sqlx("upgrade payment record", e))?;

    Ok(row.map(Into::into))
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: Uuid,
    provider_tx_id: String,
    amount: Decimal,
    currency: String,
    status: String,
    credit_amount: Decimal,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for PaymentRecord {
    fn from(row: PaymentRow) -> Self {
        let status = PaymentStatus::from_str(&row.status).unwrap_or_else(|| {
            warn!("Unknown payment status '{}' for {}", row.status, row.id);
            PaymentStatus::Failed
        });

        PaymentRecord {
            id: row.id,
            user_id: row.user_id,
            provider_tx_id: row.provider_tx_id,
            amount: row.amount,
            currency: row.currency,
            status,
            credit_amount: row.credit_amount,
            created_at: row.created_at,
        }
    }
}
