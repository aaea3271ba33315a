//! Audit log repository implementation
//!
//! Provides PostgreSQL-backed storage for audit logs.

use async_trait::async_trait;
use consulta_core::{
    models::{AuditLog, AuditLogData},
    traits::AuditRepository,
    AppResult,
};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument, warn};

use crate::error::map_sqlx;

/// PostgreSQL implementation of AuditRepository
pub struct PgAuditLogRepository {
    pool: PgPool,
}

impl PgAuditLogRepository {
    /// Create a new audit log repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an entry and return it
    #[instrument(skip(self, data))]
    pub async fn create(&self, data: &AuditLogData) -> AppResult<AuditLog> {
        debug!("Creating audit log: {} on {}", data.action, data.entity_type);

        sqlx::query(
            r#"
            INSERT INTO audit_logs (actor_id, action, entity_type, entity_id, details)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, actor_id, action, entity_type, entity_id, details, created_at
            "#,
        )
        .bind(data.actor_id)
        .bind(&data.action)
        .bind(&data.entity_type)
        .bind(&data.entity_id)
        .bind(&data.details)
        .map(|row: sqlx::postgres::PgRow| AuditLog {
            id: row.get("id"),
            actor_id: row.get("actor_id"),
            action: row.get("action"),
            entity_type: row.get("entity_type"),
            entity_id: row.get("entity_id"),
            details: row.get("details"),
            created_at: row.get("created_at"),
        })
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx("create audit log", e))
    }
}

#[async_trait]
impl AuditRepository for PgAuditLogRepository {
    async fn record(&self, entry: AuditLogData) {
        if let Err(e) = self.create(&entry).await {
            warn!("Failed to insert audit log {}: {}", entry.action, e);
        }
    }
}
