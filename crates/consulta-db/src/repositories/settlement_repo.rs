//! Settlement ledger repository implementation
//!
//! `settle_call` ends a call, writes its settlement rows and credits every
//! payee in one transaction. The conditional status flip to `ENDED` is the
//! idempotency gate; the `(call_id, settlement_type)` unique index backs it up.

use crate::balance;
use crate::error::{begin_failed, commit_failed, map_sqlx};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consulta_core::{
    models::{
        BalanceChange, BalanceKind, CallClosing, CallStatus, NewSettlement, ReferralEarnings,
        Settlement, SettlementFilter, SettlementType,
    },
    traits::{LedgerRepository, SettleOutcome},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// PostgreSQL implementation of LedgerRepository
pub struct PgSettlementRepository {
    pool: PgPool,
}

impl PgSettlementRepository {
    /// Create a new settlement repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explain why a call could not be flipped to ENDED
    async fn unsettleable(&self, call_id: Uuid) -> AppResult<SettleOutcome> {
        let state: Option<(String, Option<DateTime<Utc>>)> =
            sqlx::query_as("SELECT status, started_at FROM calls WHERE id = $1")
                .bind(call_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx("inspect call state", e))?;

        let (status, started_at) =
            state.ok_or_else(|| AppError::CallNotFound(call_id.to_string()))?;

        match CallStatus::from_str(&status) {
            Some(CallStatus::Ended) => {
                debug!("Call {} already settled", call_id);
                Ok(SettleOutcome::AlreadySettled(
                    self.find_by_call(call_id).await?,
                ))
            }
            Some(CallStatus::Cancelled) => Ok(SettleOutcome::Cancelled),
            _ if started_at.is_none() => Err(AppError::CallNotStarted(call_id.to_string())),
            _ => Err(AppError::InvalidState(format!(
                "call {} is {} and could not be ended",
                call_id, status
            ))),
        }
    }
}

#[async_trait]
impl LedgerRepository for PgSettlementRepository {
    #[instrument(skip(self, closing, entries), fields(call_id = %closing.call_id))]
    async fn settle_call(
        &self,
        closing: &CallClosing,
        entries: &[NewSettlement],
    ) -> AppResult<SettleOutcome> {
        let mut tx = self.pool.begin().await.map_err(begin_failed)?;

        let flipped = sqlx::query(
            r#"
            UPDATE calls
            SET status = 'ENDED',
                ended_at = $2,
                duration_seconds = $3,
                cost = $4,
                updated_at = NOW()
            WHERE id = $1
                AND status IN ('INITIATED', 'CONNECTING', 'ACTIVE')
                AND started_at IS NOT NULL
            "#,
        )
        .bind(closing.call_id)
        .bind(closing.ended_at)
        .bind(closing.duration_seconds)
        .bind(closing.cost)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx("end call", e))?
        .rows_affected();

        if flipped == 0 {
            drop(tx);
            return self.unsettleable(closing.call_id).await;
        }

        let mut settled = Vec::with_capacity(entries.len());

        for entry in entries {
            let row = sqlx::query_as::<sqlx::Postgres, SettlementRow>(
                r#"
                INSERT INTO settlements (call_id, payee_id, amount, settlement_type, percentage)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, call_id, payee_id, amount, settlement_type, percentage, created_at
                "#,
            )
            .bind(entry.call_id)
            .bind(entry.payee_id)
            .bind(entry.amount)
            .bind(entry.settlement_type.to_string())
            .bind(entry.percentage)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx("insert settlement", e))?;

            if entry.amount > Decimal::ZERO {
                let change = BalanceChange::credit(
                    entry.payee_id,
                    entry.amount,
                    BalanceKind::Settlement,
                    format!("{} share of call {}", entry.settlement_type, entry.call_id),
                    entry.credit_key(),
                );
                balance::apply(&mut tx, &change).await?;
            }

            settled.push(row.into());
        }

        tx.commit().await.map_err(commit_failed)?;

        info!(
            "Settled call {} ({} rows, cost {})",
            closing.call_id,
            settled.len(),
            closing.cost
        );

        Ok(SettleOutcome::Settled(settled))
    }

    #[instrument(skip(self))]
    async fn find_by_call(&self, call_id: Uuid) -> AppResult<Vec<Settlement>> {
        let rows = sqlx::query_as::<sqlx::Postgres, SettlementRow>(
            r#"
            SELECT id, call_id, payee_id, amount, settlement_type, percentage, created_at
            FROM settlements
            WHERE call_id = $1
            ORDER BY id
            "#,
        )
        .bind(call_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("find settlements by call", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, filter))]
    async fn sum_for_payee(&self, payee_id: Uuid, filter: &SettlementFilter) -> AppResult<Decimal> {
        let total: (Decimal,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM settlements
            WHERE payee_id = $1
                AND ($2::text IS NULL OR settlement_type = $2)
                AND ($3::timestamptz IS NULL OR created_at >= $3)
                AND ($4::timestamptz IS NULL OR created_at < $4)
            "#,
        )
        .bind(payee_id)
        .bind(filter.settlement_type.map(|t| t.to_string()))
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx("sum settlements for payee", e))?;

        Ok(total.0)
    }

    #[instrument(skip(self))]
    async fn referral_earnings(&self, referrer_id: Uuid) -> AppResult<Vec<ReferralEarnings>> {
        let rows: Vec<(String, Decimal, i64)> = sqlx::query_as(
            r#"
            SELECT r.code, COALESCE(SUM(s.amount), 0), COUNT(s.id)
            FROM referrals r
            LEFT JOIN calls c ON c.referral_id = r.id
            LEFT JOIN settlements s
                ON s.call_id = c.id AND s.settlement_type = 'REFERRER'
            WHERE r.referrer_id = $1
            GROUP BY r.code
            ORDER BY r.code
            "#,
        )
        .bind(referrer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("referral earnings", e))?;

        Ok(rows
            .into_iter()
            .map(|(referral_code, total_earnings, total_calls)| ReferralEarnings {
                referral_code,
                total_earnings,
                total_calls,
            })
            .collect())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct SettlementRow {
    id: i64,
    call_id: Uuid,
    payee_id: Uuid,
    amount: Decimal,
    settlement_type: String,
    percentage: Decimal,
    created_at: DateTime<Utc>,
}

impl From<SettlementRow> for Settlement {
    fn from(row: SettlementRow) -> Self {
        let settlement_type = SettlementType::from_str(&row.settlement_type).unwrap_or_else(|| {
            warn!(
                "Unknown settlement type '{}' on row {}",
                row.settlement_type, row.id
            );
            SettlementType::Company
        });

        Settlement {
            id: row.id,
            call_id: row.call_id,
            payee_id: row.payee_id,
            amount: row.amount,
            settlement_type,
            percentage: row.percentage,
            created_at: row.created_at,
        }
    }
}
