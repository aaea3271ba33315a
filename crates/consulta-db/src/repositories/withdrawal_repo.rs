//! Withdrawal request repository implementation
//!
//! Approval locks the request row, checks it is still `PENDING`, debits the
//! balance and flips the status in one transaction. Two admins racing on the
//! same request serialize on the row lock; the second sees a terminal status.

use crate::balance;
use crate::error::{begin_failed, commit_failed, map_sqlx};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consulta_core::{
    models::{
        BalanceChange, BalanceKind, WithdrawalApproval, WithdrawalRejection, WithdrawalRequest,
        WithdrawalStatus,
    },
    traits::WithdrawalRepository,
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// PostgreSQL implementation of WithdrawalRepository
pub struct PgWithdrawalRepository {
    pool: PgPool,
}

impl PgWithdrawalRepository {
    /// Create a new withdrawal repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn not_pending(request: &WithdrawalRequest) -> AppError {
        AppError::Conflict(format!(
            "withdrawal request {} is already {}",
            request.id, request.status
        ))
    }
}

#[async_trait]
impl WithdrawalRepository for PgWithdrawalRepository {
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    async fn create(&self, request: &WithdrawalRequest) -> AppResult<WithdrawalRequest> {
        debug!(
            "Creating withdrawal request {} for {}",
            request.id, request.balance_amount
        );

        let row = sqlx::query_as::<sqlx::Postgres, WithdrawalRow>(
            r#"
            INSERT INTO withdrawal_requests (
                id, user_id, balance_amount, payout_amount, destination, network,
                status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING
                id, user_id, balance_amount, payout_amount, destination, network, status,
                rejection_reason, processed_by, processed_at, tx_hash, created_at, updated_at
            "#,
        )
        .bind(request.id)
        .bind(request.user_id)
        .bind(request.balance_amount)
        .bind(request.payout_amount)
        .bind(&request.destination)
        .bind(&request.network)
        .bind(request.status.to_string())
        .bind(request.created_at)
        .bind(request.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx("create withdrawal request", e))?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<WithdrawalRequest>> {
        let row = sqlx::query_as::<sqlx::Postgres, WithdrawalRow>(
            r#"
            SELECT
                id, user_id, balance_amount, payout_amount, destination, network, status,
                rejection_reason, processed_by, processed_at, tx_hash, created_at, updated_at
            FROM withdrawal_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("find withdrawal request", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, approval), fields(withdrawal_id = %approval.withdrawal_id))]
    async fn complete(&self, approval: &WithdrawalApproval) -> AppResult<WithdrawalRequest> {
        let mut tx = self.pool.begin().await.map_err(begin_failed)?;

        let current = sqlx::query_as::<sqlx::Postgres, WithdrawalRow>(
            r#"
            SELECT
                id, user_id, balance_amount, payout_amount, destination, network, status,
                rejection_reason, processed_by, processed_at, tx_hash, created_at, updated_at
            FROM withdrawal_requests
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(approval.withdrawal_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx("lock withdrawal request", e))?
        .map(WithdrawalRequest::from)
        .ok_or_else(|| AppError::WithdrawalNotFound(approval.withdrawal_id.to_string()))?;

        if !current.status.is_pending() {
            return Err(Self::not_pending(&current));
        }

        let change = BalanceChange::debit(
            current.user_id,
            current.balance_amount,
            BalanceKind::Withdrawal,
            format!("withdrawal to {} ({})", current.destination, current.network),
            Some(current.debit_key()),
        );
        balance::apply(&mut tx, &change).await?;

        let row = sqlx::query_as::<sqlx::Postgres, WithdrawalRow>(
            r#"
            UPDATE withdrawal_requests
            SET status = $2,
                processed_by = $3,
                processed_at = NOW(),
                tx_hash = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING
                id, user_id, balance_amount, payout_amount, destination, network, status,
                rejection_reason, processed_by, processed_at, tx_hash, created_at, updated_at
            "#,
        )
        .bind(approval.withdrawal_id)
        .bind(approval.mode.completed_status().to_string())
        .bind(approval.admin_id)
        .bind(&approval.tx_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx("complete withdrawal request", e))?;

        tx.commit().await.map_err(commit_failed)?;

        info!(
            "Withdrawal {} completed by {} ({})",
            approval.withdrawal_id, approval.admin_id, row.status
        );

        Ok(row.into())
    }

    #[instrument(skip(self, rejection), fields(withdrawal_id = %rejection.withdrawal_id))]
    async fn reject(&self, rejection: &WithdrawalRejection) -> AppResult<WithdrawalRequest> {
        let row = sqlx::query_as::<sqlx::Postgres, WithdrawalRow>(
            r#"
            UPDATE withdrawal_requests
            SET status = 'REJECTED',
                rejection_reason = $3,
                processed_by = $2,
                processed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING
                id, user_id, balance_amount, payout_amount, destination, network, status,
                rejection_reason, processed_by, processed_at, tx_hash, created_at, updated_at
            "#,
        )
        .bind(rejection.withdrawal_id)
        .bind(rejection.admin_id)
        .bind(&rejection.reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("reject withdrawal request", e))?;

        match row {
            Some(row) => Ok(row.into()),
            None => {
                let current = self
                    .find_by_id(rejection.withdrawal_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::WithdrawalNotFound(rejection.withdrawal_id.to_string())
                    })?;
                Err(Self::not_pending(&current))
            }
        }
    }

    #[instrument(skip(self))]
    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<WithdrawalRequest>> {
        let rows = sqlx::query_as::<sqlx::Postgres, WithdrawalRow>(
            r#"
            SELECT
                id, user_id, balance_amount, payout_amount, destination, network, status,
                rejection_reason, processed_by, processed_at, tx_hash, created_at, updated_at
            FROM withdrawal_requests
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("list withdrawal requests", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct WithdrawalRow {
    id: Uuid,
    user_id: Uuid,
    balance_amount: Decimal,
    payout_amount: Decimal,
    destination: String,
    network: String,
    status: String,
    rejection_reason: Option<String>,
    processed_by: Option<Uuid>,
    processed_at: Option<DateTime<Utc>>,
    tx_hash: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WithdrawalRow> for WithdrawalRequest {
    fn from(row: WithdrawalRow) -> Self {
        let status = WithdrawalStatus::from_str(&row.status).unwrap_or_else(|| {
            warn!("Unknown withdrawal status '{}' for {}", row.status, row.id);
            WithdrawalStatus::Rejected
        });

        WithdrawalRequest {
            id: row.id,
            user_id: row.user_id,
            balance_amount: row.balance_amount,
            payout_amount: row.payout_amount,
            destination: row.destination,
            network: row.network,
            status,
            rejection_reason: row.rejection_reason,
            processed_by: row.processed_by,
            processed_at: row.processed_at,
            tx_hash: row.tx_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
