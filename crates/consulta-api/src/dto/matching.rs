//! Counselor matching DTOs

use consulta_services::{Presence, PresenceState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Presence update from the authenticated counselor
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceRequest {
    pub presence: Presence,
}

#[derive(Debug, Clone, Serialize)]
pub struct PresenceResponse {
    pub counselor_id: Uuid,
    pub state: PresenceState,
}

/// Match request from the authenticated caller
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MatchRequestBody {
    /// Tried first when available
    pub preferred_counselor: Option<Uuid>,

    /// Counselors already tried by this caller
    #[serde(default)]
    #[validate(length(max = 100))]
    pub exclude: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchResponse {
    pub counselor_id: Uuid,
}
