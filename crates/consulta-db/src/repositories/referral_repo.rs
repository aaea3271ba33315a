//! Referral repository implementation

use crate::error::map_sqlx;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consulta_core::{
    models::{Referral, ReferralStatus},
    traits::ReferralRepository,
    AppError, AppResult,
};
use sqlx::PgPool;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// PostgreSQL implementation of ReferralRepository
pub struct PgReferralRepository {
    pool: PgPool,
}

impl PgReferralRepository {
    /// Create a new referral repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferralRepository for PgReferralRepository {
    #[instrument(skip(self, referral), fields(code = %referral.code))]
    async fn create(&self, referral: &Referral) -> AppResult<Referral> {
        debug!(
            "Creating referral {} -> {}",
            referral.referrer_id, referral.referred_id
        );

        let row = sqlx::query_as::<sqlx::Postgres, ReferralRow>(
            r#"
            INSERT INTO referrals (
                id, referrer_id, referred_id, code, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, referrer_id, referred_id, code, status, created_at, updated_at
            "#,
        )
        .bind(referral.id)
        .bind(referral.referrer_id)
        .bind(referral.referred_id)
        .bind(&referral.code)
        .bind(referral.status.to_string())
        .bind(referral.created_at)
        .bind(referral.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match map_sqlx("create referral", e) {
            AppError::AlreadyExists(_) => AppError::AlreadyExists(format!(
                "referral code {} or referred user {}",
                referral.code, referral.referred_id
            )),
            other => other,
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Referral>> {
        let row = sqlx::query_as::<sqlx::Postgres, ReferralRow>(
            r#"
            SELECT id, referrer_id, referred_id, code, status, created_at, updated_at
            FROM referrals
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("find referral", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_by_code(&self, code: &str) -> AppResult<Option<Referral>> {
        let row = sqlx::query_as::<sqlx::Postgres, ReferralRow>(
            r#"
            SELECT id, referrer_id, referred_id, code, status, created_at, updated_at
            FROM referrals
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("find referral by code", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_by_referred(&self, referred_id: Uuid) -> AppResult<Option<Referral>> {
        let row = sqlx::query_as::<sqlx::Postgres, ReferralRow>(
            r#"
            SELECT id, referrer_id, referred_id, code, status, created_at, updated_at
            FROM referrals
            WHERE referred_id = $1
            "#,
        )
        .bind(referred_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("find referral by referred user", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_by_referrer(&self, referrer_id: Uuid) -> AppResult<Vec<Referral>> {
        let rows = sqlx::query_as::<sqlx::Postgres, ReferralRow>(
            r#"
            SELECT id, referrer_id, referred_id, code, status, created_at, updated_at
            FROM referrals
            WHERE referrer_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(referrer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("list referrals", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn set_status(&self, id: Uuid, status: ReferralStatus) -> AppResult<Option<Referral>> {
        let row = sqlx::query_as::<sqlx::Postgres, ReferralRow>(
            r#"
            UPDATE referrals
            SET status = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, referrer_id, referred_id, code, status, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("update referral status", e))?;

        Ok(row.map(Into::into))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReferralRow {
    id: Uuid,
    referrer_id: Uuid,
    referred_id: Uuid,
    code: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReferralRow> for Referral {
    fn from(row: ReferralRow) -> Self {
        // Unknown statuses are never honoured
        let status = ReferralStatus::from_str(&row.status).unwrap_or_else(|| {
            warn!("Unknown referral status '{}' for {}", row.status, row.id);
            ReferralStatus::Inactive
        });

        Referral {
            id: row.id,
            referrer_id: row.referrer_id,
            referred_id: row.referred_id,
            code: row.code,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
