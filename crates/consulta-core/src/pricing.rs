//! Call pricing and revenue split policy
//!
//! Pure, stateless arithmetic: call duration in, cost and a three-way split
//! out. Amounts are kept at full `Decimal` precision; rounding happens only
//! at presentation and payout boundaries.

use crate::config::SettlementConfig;
use crate::error::AppError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const SECONDS_PER_MINUTE: i64 = 60;

/// Per-minute rate plus the two split policies (with and without referrer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tariff {
    rate_per_minute: Decimal,
    counselor_share: Decimal,
    referrer_share: Decimal,
    company_share_with_referrer: Decimal,
    company_share: Decimal,
}

/// Division of one call's cost among its payees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSplit {
    /// Total cost of the call
    pub total: Decimal,
    pub counselor: Decimal,
    pub referrer: Option<Decimal>,
    pub company: Decimal,
    /// Fractions applied, recorded on each settlement row
    pub counselor_share: Decimal,
    pub referrer_share: Option<Decimal>,
    pub company_share: Decimal,
}

impl RevenueSplit {
    /// Whether a referrer takes part in this split
    pub fn has_referrer(&self) -> bool {
        self.referrer.is_some()
    }

    /// Sum of every payee's amount
    pub fn allocated(&self) -> Decimal {
        self.counselor + self.referrer.unwrap_or(Decimal::ZERO) + self.company
    }
}

impl Tariff {
    /// Build a tariff, checking that both split policies partition 100% of the cost
    pub fn new(
        rate_per_minute: Decimal,
        counselor_share: Decimal,
        referrer_share: Decimal,
        company_share_with_referrer: Decimal,
        company_share: Decimal,
    ) -> Result<Self, AppError> {
        if rate_per_minute <= Decimal::ZERO {
            return Err(AppError::Config(format!(
                "rate_per_minute must be positive, got {}",
                rate_per_minute
            )));
        }

        let shares = [
            counselor_share,
            referrer_share,
            company_share_with_referrer,
            company_share,
        ];
        if shares.iter().any(|s| *s < Decimal::ZERO || *s > Decimal::ONE) {
            return Err(AppError::Config(
                "split shares must lie between 0 and 1".to_string(),
            ));
        }

        if counselor_share + referrer_share + company_share_with_referrer != Decimal::ONE {
            return Err(AppError::Config(
                "counselor + referrer + company shares must sum to 1".to_string(),
            ));
        }
        if counselor_share + company_share != Decimal::ONE {
            return Err(AppError::Config(
                "counselor + company shares must sum to 1".to_string(),
            ));
        }

        Ok(Self {
            rate_per_minute,
            counselor_share,
            referrer_share,
            company_share_with_referrer,
            company_share,
        })
    }

    /// Build a tariff from the settlement section of the configuration
    pub fn from_config(config: &SettlementConfig) -> Result<Self, AppError> {
        Self::new(
            config.rate_per_minute,
            config.counselor_share,
            config.referrer_share,
            config.company_share_with_referrer,
            config.company_share,
        )
    }

    /// 0.14 per minute; 60/10/30 with a referrer, 60/40 without
    pub fn standard() -> Self {
        Self {
            rate_per_minute: Decimal::new(14, 2),
            counselor_share: Decimal::new(60, 2),
            referrer_share: Decimal::new(10, 2),
            company_share_with_referrer: Decimal::new(30, 2),
            company_share: Decimal::new(40, 2),
        }
    }

    #[inline]
    pub fn rate_per_minute(&self) -> Decimal {
        self.rate_per_minute
    }

    /// Convert whole seconds to fractional minutes. Negative input is clamped to zero.
    pub fn duration_minutes(duration_seconds: i64) -> Decimal {
        Decimal::from(duration_seconds.max(0)) / Decimal::from(SECONDS_PER_MINUTE)
    }

    /// Exact proportional cost: minutes × rate, no floor or ceiling.
    ///
    /// Negative durations are clamped to zero rather than rejected.
    pub fn call_cost(&self, duration_minutes: Decimal) -> Decimal {
        duration_minutes.max(Decimal::ZERO) * self.rate_per_minute
    }

    /// Split `cost` among counselor, referrer (if any) and company.
    ///
    /// The company amount is the remainder after the other payees, so the
    /// parts always add up to `cost` exactly, even when a product has to be
    /// rounded at the 28th decimal digit.
    pub fn split(&self, cost: Decimal, has_referrer: bool) -> RevenueSplit {
        let cost = cost.max(Decimal::ZERO);
        let counselor = cost * self.counselor_share;

        if has_referrer {
            let referrer = cost * self.referrer_share;
            RevenueSplit {
                total: cost,
                counselor,
                referrer: Some(referrer),
                company: cost - counselor - referrer,
                counselor_share: self.counselor_share,
                referrer_share: Some(self.referrer_share),
                company_share: self.company_share_with_referrer,
            }
        } else {
            RevenueSplit {
                total: cost,
                counselor,
                referrer: None,
                company: cost - counselor,
                counselor_share: self.counselor_share,
                referrer_share: None,
                company_share: self.company_share,
            }
        }
    }
}

impl Default for Tariff {
    fn default() -> Self {
        Self::standard()
    }
}
