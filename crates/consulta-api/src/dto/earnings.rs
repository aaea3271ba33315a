//! Earnings summary DTOs

use super::common::money;
use chrono::{DateTime, Utc};
use consulta_services::EarningsSummary;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Earnings dashboard view of a payee
#[derive(Debug, Clone, Serialize)]
pub struct EarningsResponse {
    pub payee_id: Uuid,
    pub counselor_earnings: Decimal,
    pub referrer_earnings: Decimal,
    pub company_earnings: Decimal,
    pub total_earnings: Decimal,
    pub balance: Decimal,
    /// Figures are stale or zero because storage was unavailable
    pub degraded: bool,
    pub generated_at: DateTime<Utc>,
}

impl From<EarningsSummary> for EarningsResponse {
    fn from(summary: EarningsSummary) -> Self {
        Self {
            payee_id: summary.payee_id,
            counselor_earnings: money(summary.counselor),
            referrer_earnings: money(summary.referrer),
            company_earnings: money(summary.company),
            total_earnings: money(summary.total),
            balance: money(summary.balance),
            degraded: summary.degraded,
            generated_at: summary.generated_at,
        }
    }
}
