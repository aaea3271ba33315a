//! In-memory storage backend
//!
//! Implements every repository trait over a single mutex-guarded state.
//! Multi-record operations work on a copy of the state and swap it in only
//! on success, which gives them the same all-or-nothing behaviour as the
//! PostgreSQL transactions. Used by tests and by local runs without a database.
//!
//! Transient failures can be injected with [`MemoryStore::fail_next`],
//! [`MemoryStore::fail_after`], [`MemoryStore::lose_commit_acks`] and
//! [`MemoryStore::set_unavailable`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consulta_core::{
    models::{
        AuditLog, AuditLogData, BalanceChange, BalanceKind, BalanceOutcome, BalanceTransaction,
        Call, CallClosing, CallStatus, NewSettlement, PaymentOutcome, PaymentRecord, Referral,
        ReferralEarnings, ReferralStatus, Settlement, SettlementFilter, SettlementType,
        WithdrawalApproval, WithdrawalRejection, WithdrawalRequest, WithdrawalStatus,
    },
    traits::{
        AuditRepository, BalanceRepository, CallRepository, LedgerRepository, PaymentRepository,
        ReferralRepository, Repositories, SettleOutcome, WithdrawalRepository,
    },
    AppError, AppResult,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, Decimal>,
    calls: HashMap<Uuid, Call>,
    settlements: Vec<Settlement>,
    referrals: HashMap<Uuid, Referral>,
    withdrawals: HashMap<Uuid, WithdrawalRequest>,
    payments: HashMap<String, PaymentRecord>,
    balance_log: Vec<BalanceTransaction>,
    audit: Vec<AuditLog>,
    next_settlement_id: i64,
    next_balance_tx_id: i64,
    next_audit_id: i64,
}

impl MemoryState {
    /// Same contract as `balance::apply`: dedup check, no negative balance,
    /// append to the log.
    fn apply_balance(&mut self, change: &BalanceChange) -> AppResult<BalanceOutcome> {
        let previous = *self
            .users
            .get(&change.user_id)
            .ok_or_else(|| AppError::UserNotFound(change.user_id.to_string()))?;

        if let Some(key) = &change.dedup_key {
            if self
                .balance_log
                .iter()
                .any(|t| t.dedup_key.as_deref() == Some(key.as_str()))
            {
                return Ok(BalanceOutcome {
                    user_id: change.user_id,
                    balance: previous,
                    applied: false,
                });
            }
        }

        let new_balance = previous + change.delta;
        if new_balance < Decimal::ZERO {
            return Err(AppError::InsufficientBalance {
                required: (-change.delta).to_string(),
                available: previous.to_string(),
            });
        }

        self.users.insert(change.user_id, new_balance);
        self.next_balance_tx_id += 1;
        self.balance_log.push(BalanceTransaction {
            id: self.next_balance_tx_id,
            user_id: change.user_id,
            amount: change.delta,
            previous_balance: previous,
            new_balance,
            kind: change.kind,
            reason: change.reason.clone(),
            dedup_key: change.dedup_key.clone(),
            created_at: Utc::now(),
        });

        Ok(BalanceOutcome {
            user_id: change.user_id,
            balance: new_balance,
            applied: true,
        })
    }

    fn settlements_for(&self, call_id: Uuid) -> Vec<Settlement> {
        self.settlements
            .iter()
            .filter(|s| s.call_id == call_id)
            .cloned()
            .collect()
    }

    fn require_user(&self, user_id: Uuid) -> AppResult<()> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("user {} does not exist", user_id)))
        }
    }
}

/// Thread-safe in-memory backend
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    unavailable: Arc<AtomicBool>,
    failures: Arc<AtomicU32>,
    /// Operations let through before `failures` start being consumed
    skips: Arc<AtomicU32>,
    lost_acks: Arc<AtomicU32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with an opening balance
    pub fn add_user(&self, user_id: Uuid, balance: Decimal) {
        self.state.lock().users.insert(user_id, balance);
    }

    /// Repository bundle backed by this store
    pub fn repositories(&self) -> Repositories {
        Repositories {
            calls: Arc::new(self.clone()),
            ledger: Arc::new(self.clone()),
            balances: Arc::new(self.clone()),
            withdrawals: Arc::new(self.clone()),
            payments: Arc::new(self.clone()),
            referrals: Arc::new(self.clone()),
            audit: Arc::new(self.clone()),
        }
    }

    /// Make the next `count` operations fail with a transient error
    pub fn fail_next(&self, count: u32) {
        self.fail_after(0, count);
    }

    /// Let `skip` operations succeed, then fail the following `count`
    pub fn fail_after(&self, skip: u32, count: u32) {
        self.skips.store(skip, Ordering::SeqCst);
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Commit the next `count` transactional writes but report each as a
    /// transient failure, like a connection lost before the COMMIT reply
    pub fn lose_commit_acks(&self, count: u32) {
        self.lost_acks.store(count, Ordering::SeqCst);
    }

    /// Make every operation fail with a transient error until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of recorded audit entries
    pub fn audit_entries(&self) -> Vec<AuditLog> {
        self.state.lock().audit.clone()
    }

    /// Snapshot of every settlement row
    pub fn settlements(&self) -> Vec<Settlement> {
        self.state.lock().settlements.clone()
    }

    /// Snapshot of the balance transaction log
    pub fn balance_log(&self) -> Vec<BalanceTransaction> {
        self.state.lock().balance_log.clone()
    }

    fn check_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Pool("memory store unavailable".to_string()));
        }

        if take_one(&self.skips) {
            return Ok(());
        }
        if take_one(&self.failures) {
            return Err(AppError::Pool("injected transient failure".to_string()));
        }

        Ok(())
    }

    /// Run `f` on a copy of the state and keep the copy only if it succeeds
    fn transact<T>(&self, f: impl FnOnce(&mut MemoryState) -> AppResult<T>) -> AppResult<T> {
        let mut guard = self.state.lock();
        let mut draft = guard.clone();
        let value = f(&mut draft)?;
        *guard = draft;

        if take_one(&self.lost_acks) {
            return Err(AppError::Pool("connection lost after commit".to_string()));
        }
        Ok(value)
    }
}

/// Decrement `counter` if positive, reporting whether it was
fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl CallRepository for MemoryStore {
    async fn create(&self, call: &Call) -> AppResult<Call> {
        self.check_available()?;
        let mut state = self.state.lock();

        state.require_user(call.caller_id)?;
        state.require_user(call.counselor_id)?;
        if state.calls.contains_key(&call.id) {
            return Err(AppError::AlreadyExists(format!("call {}", call.id)));
        }

        state.calls.insert(call.id, call.clone());
        Ok(call.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Call>> {
        self.check_available()?;
        Ok(self.state.lock().calls.get(&id).cloned())
    }

    async fn mark_connecting(&self, id: Uuid) -> AppResult<Option<Call>> {
        self.check_available()?;
        let mut state = self.state.lock();

        Ok(state.calls.get_mut(&id).and_then(|call| {
            (call.status == CallStatus::Initiated).then(|| {
                call.status = CallStatus::Connecting;
                call.updated_at = Utc::now();
                call.clone()
            })
        }))
    }

    async fn activate(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<Option<Call>> {
        self.check_available()?;
        let mut state = self.state.lock();

        Ok(state.calls.get_mut(&id).and_then(|call| {
            call.status.can_activate().then(|| {
                call.status = CallStatus::Active;
                call.started_at.get_or_insert(at);
                call.updated_at = Utc::now();
                call.clone()
            })
        }))
    }

    async fn cancel(&self, id: Uuid) -> AppResult<Option<Call>> {
        self.check_available()?;
        let mut state = self.state.lock();

        Ok(state.calls.get_mut(&id).and_then(|call| {
            (!call.status.is_terminal()).then(|| {
                call.status = CallStatus::Cancelled;
                call.updated_at = Utc::now();
                call.clone()
            })
        }))
    }
}

#[async_trait]
impl LedgerRepository for MemoryStore {
    async fn settle_call(
        &self,
        closing: &CallClosing,
        entries: &[NewSettlement],
    ) -> AppResult<SettleOutcome> {
        self.check_available()?;

        self.transact(|state| {
            let call = state
                .calls
                .get(&closing.call_id)
                .cloned()
                .ok_or_else(|| AppError::CallNotFound(closing.call_id.to_string()))?;

            match call.status {
                CallStatus::Ended => {
                    return Ok(SettleOutcome::AlreadySettled(
                        state.settlements_for(closing.call_id),
                    ))
                }
                CallStatus::Cancelled => return Ok(SettleOutcome::Cancelled),
                _ if call.started_at.is_none() => {
                    return Err(AppError::CallNotStarted(closing.call_id.to_string()))
                }
                _ => {}
            }

            if let Some(call) = state.calls.get_mut(&closing.call_id) {
                call.status = CallStatus::Ended;
                call.ended_at = Some(closing.ended_at);
                call.duration_seconds = Some(closing.duration_seconds);
                call.cost = Some(closing.cost);
                call.updated_at = Utc::now();
            }

            let mut settled = Vec::with_capacity(entries.len());
            for entry in entries {
                if state
                    .settlements
                    .iter()
                    .any(|s| s.call_id == entry.call_id && s.settlement_type == entry.settlement_type)
                {
                    return Err(AppError::AlreadyExists(format!(
                        "{} settlement for call {}",
                        entry.settlement_type, entry.call_id
                    )));
                }
                state.require_user(entry.payee_id)?;

                state.next_settlement_id += 1;
                let row = Settlement {
                    id: state.next_settlement_id,
                    call_id: entry.call_id,
                    payee_id: entry.payee_id,
                    amount: entry.amount,
                    settlement_type: entry.settlement_type,
                    percentage: entry.percentage,
                    created_at: Utc::now(),
                };

                if entry.amount > Decimal::ZERO {
                    state.apply_balance(&BalanceChange::credit(
                        entry.payee_id,
                        entry.amount,
                        BalanceKind::Settlement,
                        format!("{} share of call {}", entry.settlement_type, entry.call_id),
                        entry.credit_key(),
                    ))?;
                }

                state.settlements.push(row.clone());
                settled.push(row);
            }

            debug!("Settled call {} in memory", closing.call_id);
            Ok(SettleOutcome::Settled(settled))
        })
    }

    async fn find_by_call(&self, call_id: Uuid) -> AppResult<Vec<Settlement>> {
        self.check_available()?;
        Ok(self.state.lock().settlements_for(call_id))
    }

    async fn sum_for_payee(&self, payee_id: Uuid, filter: &SettlementFilter) -> AppResult<Decimal> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .settlements
            .iter()
            .filter(|s| s.payee_id == payee_id && filter.matches(s))
            .map(|s| s.amount)
            .sum())
    }

    async fn referral_earnings(&self, referrer_id: Uuid) -> AppResult<Vec<ReferralEarnings>> {
        self.check_available()?;
        let state = self.state.lock();

        let mut by_code: BTreeMap<String, ReferralEarnings> = BTreeMap::new();
        for referral in state.referrals.values().filter(|r| r.referrer_id == referrer_id) {
            let entry = by_code
                .entry(referral.code.clone())
                .or_insert_with(|| ReferralEarnings {
                    referral_code: referral.code.clone(),
                    total_earnings: Decimal::ZERO,
                    total_calls: 0,
                });

            for call in state
                .calls
                .values()
                .filter(|c| c.referral_id == Some(referral.id))
            {
                for row in state.settlements.iter().filter(|s| {
                    s.call_id == call.id && s.settlement_type == SettlementType::Referrer
                }) {
                    entry.total_earnings += row.amount;
                    entry.total_calls += 1;
                }
            }
        }

        Ok(by_code.into_values().collect())
    }
}

#[async_trait]
impl BalanceRepository for MemoryStore {
    async fn balance(&self, user_id: Uuid) -> AppResult<Decimal> {
        self.check_available()?;
        self.state
            .lock()
            .users
            .get(&user_id)
            .copied()
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))
    }

    async fn apply(&self, change: &BalanceChange) -> AppResult<BalanceOutcome> {
        self.check_available()?;
        self.transact(|state| state.apply_balance(change))
    }

    async fn history(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<BalanceTransaction>> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .balance_log
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl WithdrawalRepository for MemoryStore {
    async fn create(&self, request: &WithdrawalRequest) -> AppResult<WithdrawalRequest> {
        self.check_available()?;
        let mut state = self.state.lock();
        state.require_user(request.user_id)?;
        state.withdrawals.insert(request.id, request.clone());
        Ok(request.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<WithdrawalRequest>> {
        self.check_available()?;
        Ok(self.state.lock().withdrawals.get(&id).cloned())
    }

    async fn complete(&self, approval: &WithdrawalApproval) -> AppResult<WithdrawalRequest> {
        self.check_available()?;

        self.transact(|state| {
            let current = state
                .withdrawals
                .get(&approval.withdrawal_id)
                .cloned()
                .ok_or_else(|| AppError::WithdrawalNotFound(approval.withdrawal_id.to_string()))?;

            if !current.status.is_pending() {
                return Err(AppError::Conflict(format!(
                    "withdrawal request {} is already {}",
                    current.id, current.status
                )));
            }

            state.apply_balance(&BalanceChange::debit(
                current.user_id,
                current.balance_amount,
                BalanceKind::Withdrawal,
                format!("withdrawal to {} ({})", current.destination, current.network),
                Some(current.debit_key()),
            ))?;

            let now = Utc::now();
            let mut updated = current;
            updated.status = approval.mode.completed_status();
            updated.processed_by = Some(approval.admin_id);
            updated.processed_at = Some(now);
            updated.tx_hash = approval.tx_hash.clone();
            updated.updated_at = now;

            state.withdrawals.insert(updated.id, updated.clone());
            Ok(updated)
        })
    }

    async fn reject(&self, rejection: &WithdrawalRejection) -> AppResult<WithdrawalRequest> {
        self.check_available()?;

        self.transact(|state| {
            let request = state
                .withdrawals
                .get_mut(&rejection.withdrawal_id)
                .ok_or_else(|| AppError::WithdrawalNotFound(rejection.withdrawal_id.to_string()))?;

            if request.status != WithdrawalStatus::Pending {
                return Err(AppError::Conflict(format!(
                    "withdrawal request {} is already {}",
                    request.id, request.status
                )));
            }

            let now = Utc::now();
            request.status = WithdrawalStatus::Rejected;
            request.rejection_reason = Some(rejection.reason.clone());
            request.processed_by = Some(rejection.admin_id);
            request.processed_at = Some(now);
            request.updated_at = now;

            Ok(request.clone())
        })
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<WithdrawalRequest>> {
        self.check_available()?;
        let mut requests: Vec<_> = self
            .state
            .lock()
            .withdrawals
            .values()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn record_and_credit(&self, record: &PaymentRecord) -> AppResult<PaymentOutcome> {
        self.check_available()?;

        self.transact(|state| {
            let stored = match state.payments.get(&record.provider_tx_id) {
                Some(existing)
                    if existing.user_id == record.user_id
                        && existing.status.can_upgrade_to(record.status) =>
                {
                    PaymentRecord {
                        status: record.status,
                        amount: record.amount,
                        currency: record.currency.clone(),
                        credit_amount: record.credit_amount,
                        ..existing.clone()
                    }
                }
                Some(existing) => {
                    return Ok(PaymentOutcome {
                        record: existing.clone(),
                        duplicate: true,
                    });
                }
                None => {
                    state.require_user(record.user_id)?;
                    record.clone()
                }
            };

            if stored.status.credits_balance() && stored.credit_amount > Decimal::ZERO {
                state.apply_balance(&BalanceChange::credit(
                    stored.user_id,
                    stored.credit_amount,
                    BalanceKind::Payment,
                    format!("payment {} {}", stored.amount, stored.currency),
                    stored.credit_key(),
                ))?;
            }

            state
                .payments
                .insert(stored.provider_tx_id.clone(), stored.clone());

            Ok(PaymentOutcome {
                record: stored,
                duplicate: false,
            })
        })
    }

    async fn find_by_provider_tx(&self, provider_tx_id: &str) -> AppResult<Option<PaymentRecord>> {
        self.check_available()?;
        Ok(self.state.lock().payments.get(provider_tx_id).cloned())
    }
}

#[async_trait]
impl ReferralRepository for MemoryStore {
    async fn create(&self, referral: &Referral) -> AppResult<Referral> {
        self.check_available()?;
        let mut state = self.state.lock();

        state.require_user(referral.referrer_id)?;
        state.require_user(referral.referred_id)?;

        let clash = state
            .referrals
            .values()
            .any(|r| r.code == referral.code || r.referred_id == referral.referred_id);
        if clash {
            return Err(AppError::AlreadyExists(format!(
                "referral code {} or referred user {}",
                referral.code, referral.referred_id
            )));
        }

        state.referrals.insert(referral.id, referral.clone());
        Ok(referral.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Referral>> {
        self.check_available()?;
        Ok(self.state.lock().referrals.get(&id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> AppResult<Option<Referral>> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .referrals
            .values()
            .find(|r| r.code == code)
            .cloned())
    }

    async fn find_by_referred(&self, referred_id: Uuid) -> AppResult<Option<Referral>> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .referrals
            .values()
            .find(|r| r.referred_id == referred_id)
            .cloned())
    }

    async fn list_by_referrer(&self, referrer_id: Uuid) -> AppResult<Vec<Referral>> {
        self.check_available()?;
        let mut referrals: Vec<_> = self
            .state
            .lock()
            .referrals
            .values()
            .filter(|r| r.referrer_id == referrer_id)
            .cloned()
            .collect();
        referrals.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(referrals)
    }

    async fn set_status(&self, id: Uuid, status: ReferralStatus) -> AppResult<Option<Referral>> {
        self.check_available()?;
        let mut state = self.state.lock();

        Ok(state.referrals.get_mut(&id).map(|referral| {
            referral.status = status;
            referral.updated_at = Utc::now();
            referral.clone()
        }))
    }
}

#[async_trait]
impl AuditRepository for MemoryStore {
    async fn record(&self, entry: AuditLogData) {
        let mut state = self.state.lock();
        state.next_audit_id += 1;
        let id = state.next_audit_id;
        state.audit.push(AuditLog {
            id,
            actor_id: entry.actor_id,
            action: entry.action,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            details: entry.details,
            created_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn store_with_user(balance: Decimal) -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.add_user(user, balance);
        (store, user)
    }

    #[tokio::test]
    async fn test_credit_dedup_applies_once() {
        let (store, user) = store_with_user(dec!(0));
        let change = BalanceChange::credit(user, dec!(5), BalanceKind::Payment, "top-up", "k1");

        let first = BalanceRepository::apply(&store, &change).await.unwrap();
        let second = BalanceRepository::apply(&store, &change).await.unwrap();

        assert!(first.applied);
        assert!(!second.applied);
        assert_eq!(second.balance, dec!(5));
        assert_eq!(store.balance_log().len(), 1);
    }

    #[tokio::test]
    async fn test_debit_below_zero_leaves_balance() {
        let (store, user) = store_with_user(dec!(3));
        let change = BalanceChange::debit(user, dec!(5), BalanceKind::Adjustment, "fee", None);

        let result = BalanceRepository::apply(&store, &change).await;
        assert!(matches!(result, Err(AppError::InsufficientBalance { .. })));
        assert_eq!(store.balance(user).await.unwrap(), dec!(3));
    }

    #[tokio::test]
    async fn test_failed_transaction_leaves_no_trace() {
        let store = MemoryStore::new();
        let caller = Uuid::new_v4();
        let counselor = Uuid::new_v4();
        store.add_user(caller, dec!(0));
        store.add_user(counselor, dec!(0));

        let call = Call::new(caller, counselor, None, "consult-x".to_string());
        CallRepository::create(&store, &call).await.unwrap();
        store.activate(call.id, Utc::now()).await.unwrap();

        // Company payee is unknown, so the whole settlement must roll back
        let entries = vec![
            NewSettlement {
                call_id: call.id,
                payee_id: counselor,
                amount: dec!(0.6),
                settlement_type: SettlementType::Counselor,
                percentage: dec!(0.6),
            },
            NewSettlement {
                call_id: call.id,
                payee_id: Uuid::new_v4(),
                amount: dec!(0.4),
                settlement_type: SettlementType::Company,
                percentage: dec!(0.4),
            },
        ];
        let closing = CallClosing {
            call_id: call.id,
            ended_at: Utc::now(),
            duration_seconds: 60,
            cost: dec!(1),
        };

        assert!(store.settle_call(&closing, &entries).await.is_err());
        assert!(store.settlements().is_empty());
        assert_eq!(store.balance(counselor).await.unwrap(), dec!(0));
        let call = CallRepository::find_by_id(&store, call.id).await.unwrap().unwrap();
        assert_eq!(call.status, CallStatus::Active);
    }

    #[tokio::test]
    async fn test_injected_failures_are_transient() {
        let (store, user) = store_with_user(dec!(1));
        store.fail_next(1);

        let err = store.balance(user).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.balance(user).await.unwrap(), dec!(1));
    }

    #[tokio::test]
    async fn test_fail_after_skips_leading_operations() {
        let (store, user) = store_with_user(dec!(1));
        store.fail_after(2, 1);

        assert!(store.balance(user).await.is_ok());
        assert!(store.balance(user).await.is_ok());
        assert!(store.balance(user).await.unwrap_err().is_transient());
        assert!(store.balance(user).await.is_ok());
    }

    #[tokio::test]
    async fn test_lost_commit_ack_keeps_the_write() {
        let (store, user) = store_with_user(dec!(1));
        store.lose_commit_acks(1);

        let change =
            BalanceChange::credit(user, dec!(4), BalanceKind::Payment, "payment", "payment:p1");
        let err = store.apply(&change).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.balance(user).await.unwrap(), dec!(5));

        // The repeat is deduplicated against the write that did commit
        let repeat = store.apply(&change).await.unwrap();
        assert!(!repeat.applied);
        assert_eq!(repeat.balance, dec!(5));
    }
}
