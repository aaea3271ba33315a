//! Consulta Services Layer
//!
//! This crate contains the business logic of the settlement core:
//!
//! - Call lifecycle, pricing at call end and settlement
//! - Balance credits and debits
//! - Withdrawal requests and their approval workflow
//! - Payment provider webhooks
//! - Referrals, earnings summaries and counselor matching
//!
//! Services reach storage only through the repository traits of
//! `consulta-core`, so the same code runs against PostgreSQL in production
//! and against `consulta_db::MemoryStore` in tests.

pub mod balance;
pub mod call_lifecycle;
pub mod earnings;
pub mod matching;
pub mod payment;
pub mod referral;
pub mod settlement;
pub mod withdrawal;

pub use balance::BalanceService;
pub use call_lifecycle::{
    CallEndResult, CallLifecycleService, PrefixedChannelAllocator, VoiceChannelAllocator,
};
pub use earnings::{EarningsService, EarningsSummary};
pub use matching::{MatchRequest, MatchingService, Presence, PresenceState};
pub use payment::{sign_webhook, PaymentService, PaymentWebhook};
pub use referral::ReferralService;
pub use settlement::{Payees, SettlementService};
pub use withdrawal::{NewWithdrawal, WithdrawalService};

use consulta_core::{
    models::AuditLogBuilder,
    traits::{AuditRepository, CacheService, Repositories},
    AppConfig, AppResult, Tariff,
};
use consulta_db::RetryPolicy;
use std::sync::Arc;
use tracing::warn;

/// Every service, wired to one set of repositories and one cache
#[derive(Clone)]
pub struct Services {
    pub calls: Arc<CallLifecycleService>,
    pub settlement: Arc<SettlementService>,
    pub balances: Arc<BalanceService>,
    pub withdrawals: Arc<WithdrawalService>,
    pub payments: Arc<PaymentService>,
    pub referrals: Arc<ReferralService>,
    pub earnings: Arc<EarningsService>,
    pub matching: Arc<MatchingService>,
}

impl Services {
    pub fn new(
        repos: Repositories,
        cache: Arc<dyn CacheService>,
        config: &AppConfig,
    ) -> AppResult<Self> {
        let tariff = Tariff::from_config(&config.settlement)?;
        let retry = RetryPolicy::new(&config.retry);

        let settlement = Arc::new(SettlementService::new(
            repos.ledger.clone(),
            config.settlement.company_account_id,
            retry.clone(),
        ));
        let referrals = Arc::new(ReferralService::new(
            repos.referrals.clone(),
            repos.ledger.clone(),
            repos.audit.clone(),
        ));
        let matching = Arc::new(MatchingService::new(cache.clone()));
        let earnings = Arc::new(EarningsService::new(
            repos.ledger.clone(),
            repos.balances.clone(),
            cache,
            config.redis.earnings_ttl_secs,
        ));
        let calls = Arc::new(CallLifecycleService::new(
            repos.calls.clone(),
            referrals.clone(),
            settlement.clone(),
            matching.clone(),
            earnings.clone(),
            tariff,
            Arc::new(PrefixedChannelAllocator::new(
                config.voice.channel_prefix.clone(),
            )),
        ));

        Ok(Self {
            calls,
            settlement,
            balances: Arc::new(BalanceService::new(repos.balances.clone(), retry.clone())),
            withdrawals: Arc::new(WithdrawalService::new(
                repos.withdrawals.clone(),
                repos.balances.clone(),
                repos.audit.clone(),
                &config.payouts,
                retry.clone(),
            )),
            payments: Arc::new(PaymentService::new(
                repos.payments.clone(),
                repos.audit.clone(),
                &config.payments,
                retry,
            )),
            referrals,
            earnings,
            matching,
        })
    }
}

/// Record an audit entry, logging builder mistakes instead of failing
pub(crate) async fn audit(repo: &dyn AuditRepository, builder: AuditLogBuilder) {
    match builder.build() {
        Ok(entry) => repo.record(entry).await,
        Err(e) => warn!("Skipping malformed audit entry: {}", e),
    }
}
