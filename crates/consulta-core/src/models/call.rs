//! Call model
//!
//! A voice consultation between a caller and a counselor, tracked from the
//! initial request until it ends (and is settled) or is cancelled.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Call status
///
/// `Initiated → Connecting → Active → Ended`, with `Cancelled` reachable from
/// any non-terminal state. `Ended` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    #[default]
    Initiated,
    Connecting,
    Active,
    Ended,
    Cancelled,
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::Initiated => write!(f, "INITIATED"),
            CallStatus::Connecting => write!(f, "CONNECTING"),
            CallStatus::Active => write!(f, "ACTIVE"),
            CallStatus::Ended => write!(f, "ENDED"),
            CallStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl CallStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "INITIATED" => Some(CallStatus::Initiated),
            "CONNECTING" => Some(CallStatus::Connecting),
            "ACTIVE" => Some(CallStatus::Active),
            "ENDED" => Some(CallStatus::Ended),
            "CANCELLED" => Some(CallStatus::Cancelled),
            _ => None,
        }
    }

    /// Check if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::Ended | CallStatus::Cancelled)
    }

    /// Check if the call may become active from this state
    pub fn can_activate(&self) -> bool {
        matches!(self, CallStatus::Initiated | CallStatus::Connecting)
    }

    /// Statuses from which a call may still be ended or cancelled
    pub fn open_statuses() -> [CallStatus; 3] {
        [
            CallStatus::Initiated,
            CallStatus::Connecting,
            CallStatus::Active,
        ]
    }
}

/// Call entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub id: Uuid,

    /// User paying for the consultation
    pub caller_id: Uuid,

    /// Counselor answering the call
    pub counselor_id: Uuid,

    /// Referral honoured for this call, if the caller supplied an active code
    pub referral_id: Option<Uuid>,

    pub status: CallStatus,

    /// Voice transport channel identifier
    pub channel_id: String,

    /// Set when the call first becomes active
    pub started_at: Option<DateTime<Utc>>,

    /// Set together with `duration_seconds` and `cost` when the call ends
    pub ended_at: Option<DateTime<Utc>>,

    pub duration_seconds: Option<i64>,

    pub cost: Option<Decimal>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Call {
    /// Create a new call in the `Initiated` state
    pub fn new(
        caller_id: Uuid,
        counselor_id: Uuid,
        referral_id: Option<Uuid>,
        channel_id: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            caller_id,
            counselor_id,
            referral_id,
            status: CallStatus::Initiated,
            channel_id,
            started_at: None,
            ended_at: None,
            duration_seconds: None,
            cost: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Seconds elapsed between `started_at` and `at`, never negative.
    ///
    /// Returns `None` if the call never became active.
    pub fn elapsed_seconds(&self, at: DateTime<Utc>) -> Option<i64> {
        self.started_at
            .map(|started| (at - started).num_seconds().max(0))
    }
}

/// Terminal fields written when a call ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallClosing {
    pub call_id: Uuid,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub cost: Decimal,
}
