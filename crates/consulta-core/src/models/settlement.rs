//! Settlement model
//!
//! One immutable row per payee per ended call. Corrections are new rows,
//! never updates.

use crate::pricing::RevenueSplit;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which party a settlement row pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementType {
    Counselor,
    Referrer,
    Company,
}

impl fmt::Display for SettlementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementType::Counselor => write!(f, "COUNSELOR"),
            SettlementType::Referrer => write!(f, "REFERRER"),
            SettlementType::Company => write!(f, "COMPANY"),
        }
    }
}

impl SettlementType {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "COUNSELOR" => Some(SettlementType::Counselor),
            "REFERRER" => Some(SettlementType::Referrer),
            "COMPANY" => Some(SettlementType::Company),
            _ => None,
        }
    }
}

/// Persisted settlement row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub id: i64,
    pub call_id: Uuid,
    pub payee_id: Uuid,
    /// Non-negative, full precision
    pub amount: Decimal,
    pub settlement_type: SettlementType,
    /// Split fraction that produced `amount`
    pub percentage: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Settlement row about to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSettlement {
    pub call_id: Uuid,
    pub payee_id: Uuid,
    pub amount: Decimal,
    pub settlement_type: SettlementType,
    pub percentage: Decimal,
}

impl NewSettlement {
    /// Build the rows for one call: counselor, referrer (when the split has
    /// one and a referrer payee is known) and company.
    pub fn from_split(
        call_id: Uuid,
        counselor_id: Uuid,
        referrer_id: Option<Uuid>,
        company_id: Uuid,
        split: &RevenueSplit,
    ) -> Vec<NewSettlement> {
        let mut rows = Vec::with_capacity(3);

        rows.push(NewSettlement {
            call_id,
            payee_id: counselor_id,
            amount: split.counselor,
            settlement_type: SettlementType::Counselor,
            percentage: split.counselor_share,
        });

        if let (Some(referrer_id), Some(amount), Some(share)) =
            (referrer_id, split.referrer, split.referrer_share)
        {
            rows.push(NewSettlement {
                call_id,
                payee_id: referrer_id,
                amount,
                settlement_type: SettlementType::Referrer,
                percentage: share,
            });
        }

        rows.push(NewSettlement {
            call_id,
            payee_id: company_id,
            amount: split.company,
            settlement_type: SettlementType::Company,
            percentage: split.company_share,
        });

        rows
    }

    /// Idempotency key of the balance credit this row produces
    pub fn credit_key(&self) -> String {
        format!("settlement:{}:{}", self.call_id, self.settlement_type)
    }
}

/// Per-call settlement totals, as returned by the call-end operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub call_id: Uuid,
    pub total_cost: Decimal,
    pub counselor: Decimal,
    pub referrer: Option<Decimal>,
    pub company: Decimal,
    pub has_referrer: bool,
}

impl SettlementSummary {
    /// Fold persisted rows back into per-party totals
    pub fn from_rows(call_id: Uuid, rows: &[Settlement]) -> Self {
        let sum_of = |kind: SettlementType| -> Option<Decimal> {
            let mut found = false;
            let total = rows
                .iter()
                .filter(|r| r.settlement_type == kind)
                .inspect(|_| found = true)
                .map(|r| r.amount)
                .sum::<Decimal>();
            found.then_some(total)
        };

        let counselor = sum_of(SettlementType::Counselor).unwrap_or(Decimal::ZERO);
        let referrer = sum_of(SettlementType::Referrer);
        let company = sum_of(SettlementType::Company).unwrap_or(Decimal::ZERO);

        Self {
            call_id,
            total_cost: counselor + referrer.unwrap_or(Decimal::ZERO) + company,
            counselor,
            referrer,
            company,
            has_referrer: referrer.is_some(),
        }
    }
}

/// Filter for payee settlement sums
#[derive(Debug, Clone, Default)]
pub struct SettlementFilter {
    pub settlement_type: Option<SettlementType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl SettlementFilter {
    /// Check whether a row falls inside the filter (`from` inclusive, `to` exclusive)
    pub fn matches(&self, row: &Settlement) -> bool {
        self.settlement_type.map_or(true, |t| t == row.settlement_type)
            && self.from.map_or(true, |from| row.created_at >= from)
            && self.to.map_or(true, |to| row.created_at < to)
    }
}

/// Earnings of one referral code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralEarnings {
    pub referral_code: String,
    pub total_earnings: Decimal,
    pub total_calls: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::Tariff;
    use rust_decimal_macros::dec;

    fn row(kind: SettlementType, amount: Decimal) -> Settlement {
        Settlement {
            id: 0,
            call_id: Uuid::nil(),
            payee_id: Uuid::new_v4(),
            amount,
            settlement_type: kind,
            percentage: dec!(0),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_rows_without_referrer() {
        let split = Tariff::standard().split(dec!(1.4), false);
        let rows = NewSettlement::from_split(
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            Uuid::new_v4(),
            &split,
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].settlement_type, SettlementType::Counselor);
        assert_eq!(rows[1].settlement_type, SettlementType::Company);
        assert_eq!(rows[1].amount, dec!(0.56));
    }

    #[test]
    fn test_rows_with_referrer() {
        let referrer = Uuid::new_v4();
        let split = Tariff::standard().split(dec!(1.4), true);
        let rows = NewSettlement::from_split(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Some(referrer),
            Uuid::new_v4(),
            &split,
        );

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].payee_id, referrer);
        assert_eq!(rows[1].amount, dec!(0.14));
        assert_eq!(rows[1].percentage, dec!(0.10));
        let total: Decimal = rows.iter().map(|r| r.amount).sum();
        assert_eq!(total, dec!(1.4));
    }

    #[test]
    fn test_credit_keys_are_distinct_per_row() {
        let split = Tariff::standard().split(dec!(1.4), true);
        let rows = NewSettlement::from_split(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            Uuid::new_v4(),
            &split,
        );
        assert_ne!(rows[0].credit_key(), rows[1].credit_key());
        assert!(rows[2].credit_key().ends_with(":COMPANY"));
    }

    #[test]
    fn test_summary_from_rows() {
        let rows = vec![
            row(SettlementType::Counselor, dec!(0.84)),
            row(SettlementType::Referrer, dec!(0.14)),
            row(SettlementType::Company, dec!(0.42)),
        ];
        let summary = SettlementSummary::from_rows(Uuid::nil(), &rows);
        assert_eq!(summary.total_cost, dec!(1.40));
        assert!(summary.has_referrer);

        let summary = SettlementSummary::from_rows(Uuid::nil(), &rows[..1]);
        assert!(!summary.has_referrer);
        assert_eq!(summary.referrer, None);
    }

    #[test]
    fn test_filter_matches() {
        let r = row(SettlementType::Company, dec!(1));
        assert!(SettlementFilter::default().matches(&r));

        let by_type = SettlementFilter {
            settlement_type: Some(SettlementType::Counselor),
            ..Default::default()
        };
        assert!(!by_type.matches(&r));

        let future = SettlementFilter {
            from: Some(Utc::now() + chrono::Duration::hours(1)),
            ..Default::default()
        };
        assert!(!future.matches(&r));
    }
}
