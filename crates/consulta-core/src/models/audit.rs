//! Audit log model
//!
//! Records admin decisions and security failures (rejected webhook
//! signatures, denied permissions) for later review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: i64,

    /// Acting user, if known
    pub actor_id: Option<Uuid>,

    /// Action performed (e.g. "withdrawal.approve")
    pub action: String,

    /// Entity type affected (e.g. "withdrawal", "referral", "payment")
    pub entity_type: String,

    pub entity_id: Option<String>,

    /// Additional details (JSON)
    pub details: Option<JsonValue>,

    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    /// Create a new audit log builder
    pub fn builder() -> AuditLogBuilder {
        AuditLogBuilder::default()
    }
}

/// Builder for audit log entries
#[derive(Debug, Default)]
pub struct AuditLogBuilder {
    actor_id: Option<Uuid>,
    action: Option<String>,
    entity_type: Option<String>,
    entity_id: Option<String>,
    details: Option<JsonValue>,
}

impl AuditLogBuilder {
    pub fn actor_id(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn entity_id(mut self, entity_id: impl ToString) -> Self {
        self.entity_id = Some(entity_id.to_string());
        self
    }

    pub fn details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }

    /// Build the entry data (not yet persisted)
    pub fn build(self) -> Result<AuditLogData, &'static str> {
        Ok(AuditLogData {
            actor_id: self.actor_id,
            action: self.action.ok_or("action is required")?,
            entity_type: self.entity_type.ok_or("entity_type is required")?,
            entity_id: self.entity_id,
            details: self.details,
        })
    }
}

/// Data for creating an audit log entry
#[derive(Debug, Clone)]
pub struct AuditLogData {
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub details: Option<JsonValue>,
}
