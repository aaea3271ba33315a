//! Common traits for repositories and services
//!
//! Storage is reached only through these traits. Each method that spans more
//! than one record (settling a call, completing a withdrawal, recording a
//! payment) is a single atomic unit in every implementation.

use crate::error::AppError;
use crate::models::{
    AuditLogData, BalanceChange, BalanceOutcome, BalanceTransaction, Call, CallClosing,
    NewSettlement, PaymentOutcome, PaymentRecord, Referral, ReferralEarnings, ReferralStatus,
    Settlement, SettlementFilter, WithdrawalApproval, WithdrawalRejection, WithdrawalRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Call repository
#[async_trait]
pub trait CallRepository: Send + Sync {
    /// Persist a new call. Caller and counselor must exist.
    async fn create(&self, call: &Call) -> Result<Call, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Call>, AppError>;

    /// INITIATED → CONNECTING. `None` if the call was not INITIATED.
    async fn mark_connecting(&self, id: Uuid) -> Result<Option<Call>, AppError>;

    /// INITIATED | CONNECTING → ACTIVE, keeping an existing `started_at`.
    ///
    /// `None` if the call was not in an activatable state.
    async fn activate(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<Call>, AppError>;

    /// Any non-terminal state → CANCELLED. `None` if the call was already terminal.
    async fn cancel(&self, id: Uuid) -> Result<Option<Call>, AppError>;
}

/// Outcome of settling a call
#[derive(Debug, Clone)]
pub enum SettleOutcome {
    /// This invocation ended the call and wrote these rows
    Settled(Vec<Settlement>),
    /// The call had already ended; these are the rows written back then
    AlreadySettled(Vec<Settlement>),
    /// The call was cancelled before it could end; nothing was written
    Cancelled,
}

/// Settlement ledger
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// End a call and settle it in one transaction.
    ///
    /// Flips the call to ENDED with its terminal fields, inserts `entries`
    /// and credits each payee. The status flip is conditional on the call
    /// being non-terminal with `started_at` set, so concurrent invocations
    /// settle at most once.
    ///
    /// Errors with `CallNotFound` or `CallNotStarted` when the flip cannot happen
    /// for those reasons.
    async fn settle_call(
        &self,
        closing: &CallClosing,
        entries: &[NewSettlement],
    ) -> Result<SettleOutcome, AppError>;

    async fn find_by_call(&self, call_id: Uuid) -> Result<Vec<Settlement>, AppError>;

    /// Sum of settlement amounts paid to `payee_id`
    async fn sum_for_payee(
        &self,
        payee_id: Uuid,
        filter: &SettlementFilter,
    ) -> Result<Decimal, AppError>;

    /// REFERRER earnings grouped by referral code
    async fn referral_earnings(&self, referrer_id: Uuid)
        -> Result<Vec<ReferralEarnings>, AppError>;
}

/// Balance accounting storage
#[async_trait]
pub trait BalanceRepository: Send + Sync {
    /// Current balance. `UserNotFound` for unknown users.
    async fn balance(&self, user_id: Uuid) -> Result<Decimal, AppError>;

    /// Apply one signed change under a row lock.
    ///
    /// A change whose dedup key was already applied returns the current
    /// balance with `applied = false`. A change that would make the balance
    /// negative fails with `InsufficientBalance` and leaves it untouched.
    async fn apply(&self, change: &BalanceChange) -> Result<BalanceOutcome, AppError>;

    /// Most recent transactions first
    async fn history(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<BalanceTransaction>, AppError>;
}

/// Withdrawal request storage
#[async_trait]
pub trait WithdrawalRepository: Send + Sync {
    async fn create(&self, request: &WithdrawalRequest) -> Result<WithdrawalRequest, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WithdrawalRequest>, AppError>;

    /// Debit the balance and mark the request completed in one transaction.
    ///
    /// Fails with `Conflict` unless the request is PENDING and with
    /// `InsufficientBalance` if the balance no longer covers it; in both
    /// cases nothing changes.
    async fn complete(&self, approval: &WithdrawalApproval)
        -> Result<WithdrawalRequest, AppError>;

    /// Mark a PENDING request rejected. `Conflict` otherwise.
    async fn reject(&self, rejection: &WithdrawalRejection)
        -> Result<WithdrawalRequest, AppError>;

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<WithdrawalRequest>, AppError>;
}

/// Inbound payment storage
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert the record and, for completed payments, credit the balance in
    /// the same transaction. A known `provider_tx_id` returns the stored
    /// record with `duplicate = true` and changes nothing.
    async fn record_and_credit(&self, record: &PaymentRecord) -> Result<PaymentOutcome, AppError>;

    async fn find_by_provider_tx(
        &self,
        provider_tx_id: &str,
    ) -> Result<Option<PaymentRecord>, AppError>;
}

/// Referral storage
#[async_trait]
pub trait ReferralRepository: Send + Sync {
    /// Insert a referral. `AlreadyExists` on a duplicate code or referred user.
    async fn create(&self, referral: &Referral) -> Result<Referral, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Referral>, AppError>;

    /// Look up a code regardless of status
    async fn find_by_code(&self, code: &str) -> Result<Option<Referral>, AppError>;

    async fn find_by_referred(&self, referred_id: Uuid) -> Result<Option<Referral>, AppError>;

    async fn list_by_referrer(&self, referrer_id: Uuid) -> Result<Vec<Referral>, AppError>;

    async fn set_status(
        &self,
        id: Uuid,
        status: ReferralStatus,
    ) -> Result<Option<Referral>, AppError>;
}

/// Audit trail
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Record an entry. Failures are logged and swallowed so they never break
    /// the request being audited.
    async fn record(&self, entry: AuditLogData);
}

/// Key/value and set cache
///
/// Values are JSON strings; see `consulta_cache::get_json`/`set_json` for
/// typed access.
#[async_trait]
pub trait CacheService: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, AppError>;

    async fn set_raw(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), AppError>;

    async fn delete(&self, key: &str) -> Result<bool, AppError>;

    /// Add to set. `true` if the member was not present.
    async fn sadd(&self, key: &str, member: &str) -> Result<bool, AppError>;

    /// Remove from set. `true` if the member was present.
    async fn srem(&self, key: &str, member: &str) -> Result<bool, AppError>;

    async fn smembers(&self, key: &str) -> Result<Vec<String>, AppError>;
}

/// Every storage seam, bundled for injection
#[derive(Clone)]
pub struct Repositories {
    pub calls: Arc<dyn CallRepository>,
    pub ledger: Arc<dyn LedgerRepository>,
    pub balances: Arc<dyn BalanceRepository>,
    pub withdrawals: Arc<dyn WithdrawalRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub referrals: Arc<dyn ReferralRepository>,
    pub audit: Arc<dyn AuditRepository>,
}
