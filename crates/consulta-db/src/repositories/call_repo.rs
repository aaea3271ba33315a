//! Call repository implementation
//!
//! State transitions are single conditional `UPDATE`s: the `WHERE status IN`
//! clause is the state check, so two racing transitions cannot both succeed.

use crate::error::map_sqlx;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consulta_core::{
    models::{Call, CallStatus},
    traits::CallRepository,
    AppResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// PostgreSQL implementation of CallRepository
pub struct PgCallRepository {
    pool: PgPool,
}

impl PgCallRepository {
    /// Create a new call repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CallRepository for PgCallRepository {
    #[instrument(skip(self, call), fields(call_id = %call.id))]
    async fn create(&self, call: &Call) -> AppResult<Call> {
        debug!(
            "Creating call {} -> {}",
            call.caller_id, call.counselor_id
        );

        let row = sqlx::query_as::<sqlx::Postgres, CallRow>(
            r#"
            INSERT INTO calls (
                id, caller_id, counselor_id, referral_id, status, channel_id,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                id, caller_id, counselor_id, referral_id, status, channel_id,
                started_at, ended_at, duration_seconds, cost, created_at, updated_at
            "#,
        )
        .bind(call.id)
        .bind(call.caller_id)
        .bind(call.counselor_id)
        .bind(call.referral_id)
        .bind(call.status.to_string())
        .bind(&call.channel_id)
        .bind(call.created_at)
        .bind(call.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx("create call", e))?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Call>> {
        let row = sqlx::query_as::<sqlx::Postgres, CallRow>(
            r#"
            SELECT
                id, caller_id, counselor_id, referral_id, status, channel_id,
                started_at, ended_at, duration_seconds, cost, created_at, updated_at
            FROM calls
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("find call", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn mark_connecting(&self, id: Uuid) -> AppResult<Option<Call>> {
        let row = sqlx::query_as::<sqlx::Postgres, CallRow>(
            r#"
            UPDATE calls
            SET status = 'CONNECTING',
                updated_at = NOW()
            WHERE id = $1 AND status = 'INITIATED'
            RETURNING
                id, caller_id, counselor_id, referral_id, status, channel_id,
                started_at, ended_at, duration_seconds, cost, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("mark call connecting", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn activate(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<Option<Call>> {
        let row = sqlx::query_as::<sqlx::Postgres, CallRow>(
            r#"
            UPDATE calls
            SET status = 'ACTIVE',
                started_at = COALESCE(started_at, $2),
                updated_at = NOW()
            WHERE id = $1 AND status IN ('INITIATED', 'CONNECTING')
            RETURNING
                id, caller_id, counselor_id, referral_id, status, channel_id,
                started_at, ended_at, duration_seconds, cost, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("activate call", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn cancel(&self, id: Uuid) -> AppResult<Option<Call>> {
        let row = sqlx::query_as::<sqlx::Postgres, CallRow>(
            r#"
            UPDATE calls
            SET status = 'CANCELLED',
                updated_at = NOW()
            WHERE id = $1 AND status IN ('INITIATED', 'CONNECTING', 'ACTIVE')
            RETURNING
                id, caller_id, counselor_id, referral_id, status, channel_id,
                started_at, ended_at, duration_seconds, cost, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("cancel call", e))?;

        Ok(row.map(Into::into))
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct CallRow {
    id: Uuid,
    caller_id: Uuid,
    counselor_id: Uuid,
    referral_id: Option<Uuid>,
    status: String,
    channel_id: String,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    duration_seconds: Option<i64>,
    cost: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CallRow> for Call {
    fn from(row: CallRow) -> Self {
        let status = CallStatus::from_str(&row.status).unwrap_or_else(|| {
            warn!("Unknown call status '{}' for call {}", row.status, row.id);
            CallStatus::Cancelled
        });

        Call {
            id: row.id,
            caller_id: row.caller_id,
            counselor_id: row.counselor_id,
            referral_id: row.referral_id,
            status,
            channel_id: row.channel_id,
            started_at: row.started_at,
            ended_at: row.ended_at,
            duration_seconds: row.duration_seconds,
            cost: row.cost,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
