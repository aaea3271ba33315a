//! Earnings summary service
//!
//! Read-only dashboard view of what a payee has earned per settlement type,
//! plus the current balance. It is observational, not authoritative, so it
//! serves cached settlement sums when they are fresh and degrades instead of
//! failing when storage is down. Settlements invalidate the cached sums; the
//! balance also moves on payments and payouts, so it is read live on every
//! request.

use chrono::{DateTime, Utc};
use consulta_cache::{get_json, keys, set_json};
use consulta_core::{
    models::{SettlementFilter, SettlementType},
    traits::{BalanceRepository, CacheService, LedgerRepository},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Earnings of one payee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsSummary {
    pub payee_id: Uuid,
    pub counselor: Decimal,
    pub referrer: Decimal,
    pub company: Decimal,
    pub total: Decimal,
    pub balance: Decimal,
    /// Set when storage was unavailable and the figures are stale or zero
    #[serde(default)]
    pub degraded: bool,
    pub generated_at: DateTime<Utc>,
}

impl EarningsSummary {
    fn zero(payee_id: Uuid) -> Self {
        Self {
            payee_id,
            counselor: Decimal::ZERO,
            referrer: Decimal::ZERO,
            company: Decimal::ZERO,
            total: Decimal::ZERO,
            balance: Decimal::ZERO,
            degraded: true,
            generated_at: Utc::now(),
        }
    }
}

pub struct EarningsService {
    ledger: Arc<dyn LedgerRepository>,
    balances: Arc<dyn BalanceRepository>,
    cache: Arc<dyn CacheService>,
    ttl_secs: u64,
}

impl EarningsService {
    pub fn new(
        ledger: Arc<dyn LedgerRepository>,
        balances: Arc<dyn BalanceRepository>,
        cache: Arc<dyn CacheService>,
        ttl_secs: u64,
    ) -> Self {
        Self {
            ledger,
            balances,
            cache,
            ttl_secs,
        }
    }

    /// Earnings summary for a payee
    ///
    /// Unknown payees are a `UserNotFound` error. Infrastructure failures
    /// return the last good summary, or zeros, flagged `degraded`.
    #[instrument(skip(self))]
    pub async fn summary(&self, payee_id: Uuid) -> AppResult<EarningsSummary> {
        let key = keys::earnings_key(payee_id);

        match get_json::<EarningsSummary>(self.cache.as_ref(), &key).await {
            Ok(Some(cached)) => return Ok(self.with_current_balance(cached).await),
            Ok(None) => {}
            Err(e) => warn!("Earnings cache read failed for {}: {}", payee_id, e),
        }

        match self.load(payee_id).await {
            Ok(summary) => {
                self.store(&summary).await;
                Ok(summary)
            }
            Err(e) if is_infrastructure(&e) => {
                warn!("Serving degraded earnings for {}: {}", payee_id, e);
                Ok(self.fallback(payee_id).await)
            }
            Err(e) => Err(e),
        }
    }

    /// Drop the fresh cached summary so the next read recomputes it
    pub async fn invalidate(&self, payee_id: Uuid) {
        if let Err(e) = self.cache.delete(&keys::earnings_key(payee_id)).await {
            warn!("Failed to invalidate earnings for {}: {}", payee_id, e);
        }
    }

    async fn with_current_balance(&self, cached: EarningsSummary) -> EarningsSummary {
        match self.balances.balance(cached.payee_id).await {
            Ok(balance) => EarningsSummary { balance, ..cached },
            Err(e) => {
                warn!(
                    "Balance unavailable for {}, serving cached figures: {}",
                    cached.payee_id, e
                );
                EarningsSummary {
                    degraded: true,
                    ..cached
                }
            }
        }
    }

    async fn load(&self, payee_id: Uuid) -> AppResult<EarningsSummary> {
        let balance = self.balances.balance(payee_id).await?;
        let counselor = self.sum_of(payee_id, SettlementType::Counselor).await?;
        let referrer = self.sum_of(payee_id, SettlementType::Referrer).await?;
        let company = self.sum_of(payee_id, SettlementType::Company).await?;

        Ok(EarningsSummary {
            payee_id,
            counselor,
            referrer,
            company,
            total: counselor + referrer + company,
            balance,
            degraded: false,
            generated_at: Utc::now(),
        })
    }

    async fn sum_of(&self, payee_id: Uuid, kind: SettlementType) -> AppResult<Decimal> {
        let filter = SettlementFilter {
            settlement_type: Some(kind),
            ..Default::default()
        };
        self.ledger.sum_for_payee(payee_id, &filter).await
    }

    async fn store(&self, summary: &EarningsSummary) {
        let cache = self.cache.as_ref();
        let fresh_key = keys::earnings_key(summary.payee_id);
        let last_key = keys::earnings_fallback_key(summary.payee_id);
        let fresh = set_json(
            cache,
            &fresh_key,
            summary,
            self.ttl_secs,
        );
        let last = set_json(
            cache,
            &last_key,
            summary,
            keys::EARNINGS_FALLBACK_TTL_SECS,
        );

        let (fresh, last) = futures::join!(fresh, last);
        if let Err(e) = fresh.and(last) {
            warn!("Failed to cache earnings for {}: {}", summary.payee_id, e);
        }
    }

    async fn fallback(&self, payee_id: Uuid) -> EarningsSummary {
        let key = keys::earnings_fallback_key(payee_id);
        match get_json::<EarningsSummary>(self.cache.as_ref(), &key).await {
            Ok(Some(last)) => {
                debug!("Using last good earnings for {}", payee_id);
                EarningsSummary {
                    degraded: true,
                    ..last
                }
            }
            Ok(None) => EarningsSummary::zero(payee_id),
            Err(e) => {
                warn!("Earnings fallback unavailable for {}: {}", payee_id, e);
                EarningsSummary::zero(payee_id)
            }
        }
    }
}

fn is_infrastructure(err: &AppError) -> bool {
    err.is_transient() || matches!(err, AppError::Database(_) | AppError::Transaction(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use consulta_cache::MemoryCache;
    use consulta_core::models::{BalanceChange, BalanceKind};
    use consulta_db::MemoryStore;
    use rust_decimal_macros::dec;

    fn service(store: &MemoryStore, cache: &MemoryCache) -> EarningsService {
        let repos = store.repositories();
        EarningsService::new(repos.ledger, repos.balances, Arc::new(cache.clone()), 60)
    }

    #[tokio::test]
    async fn test_summary_reads_balance_and_caches() {
        let store = MemoryStore::new();
        let cache = MemoryCache::new();
        let payee = Uuid::new_v4();
        store.add_user(payee, dec!(12.5));

        let earnings = service(&store, &cache);
        let summary = earnings.summary(payee).await.unwrap();
        assert_eq!(summary.balance, dec!(12.5));
        assert_eq!(summary.total, Decimal::ZERO);
        assert!(!summary.degraded);

        // Cached sums survive a storage outage, flagged as stale
        store.set_unavailable(true);
        let cached = earnings.summary(payee).await.unwrap();
        assert_eq!(cached.balance, dec!(12.5));
        assert!(cached.degraded);
    }

    #[tokio::test]
    async fn test_cached_summary_reports_current_balance() {
        let store = MemoryStore::new();
        let cache = MemoryCache::new();
        let payee = Uuid::new_v4();
        store.add_user(payee, dec!(12.5));

        let earnings = service(&store, &cache);
        earnings.summary(payee).await.unwrap();

        // Balance moves without a settlement, as a payment or payout does
        store
            .repositories()
            .balances
            .apply(&BalanceChange::credit(
                payee,
                dec!(7.5),
                BalanceKind::Payment,
                "payment 7.5 USD",
                "payment:tx-1".to_string(),
            ))
            .await
            .unwrap();

        let summary = earnings.summary(payee).await.unwrap();
        assert_eq!(summary.balance, dec!(20));
        assert!(!summary.degraded);
    }

    #[tokio::test]
    async fn test_degrades_to_last_good_summary() {
        let store = MemoryStore::new();
        let cache = MemoryCache::new();
        let payee = Uuid::new_v4();
        store.add_user(payee, dec!(3));

        let earnings = service(&store, &cache);
        earnings.summary(payee).await.unwrap();
        earnings.invalidate(payee).await;

        store.set_unavailable(true);
        let summary = earnings.summary(payee).await.unwrap();
        assert!(summary.degraded);
        assert_eq!(summary.balance, dec!(3));
    }

    #[tokio::test]
    async fn test_degrades_to_zero_without_any_snapshot() {
        let store = MemoryStore::new();
        let cache = MemoryCache::new();
        let payee = Uuid::new_v4();
        store.add_user(payee, dec!(3));
        store.set_unavailable(true);

        let summary = service(&store, &cache).summary(payee).await.unwrap();
        assert!(summary.degraded);
        assert_eq!(summary.balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_unknown_payee_is_not_degraded() {
        let store = MemoryStore::new();
        let cache = MemoryCache::new();

        let result = service(&store, &cache).summary(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_cache_outage_still_computes() {
        let store = MemoryStore::new();
        let cache = MemoryCache::new();
        let payee = Uuid::new_v4();
        store.add_user(payee, dec!(1));
        cache.set_unavailable(true);

        let summary = service(&store, &cache).summary(payee).await.unwrap();
        assert_eq!(summary.balance, dec!(1));
        assert!(!summary.degraded);
    }
}
