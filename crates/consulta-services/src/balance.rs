//! Balance accounting service
//!
//! Credits and debits validated at the service boundary and applied through
//! `BalanceRepository::apply`, which serializes every change to a user's
//! balance on the user's row lock.

use consulta_core::{
    models::{BalanceChange, BalanceKind, BalanceOutcome, BalanceTransaction},
    traits::BalanceRepository,
    AppError, AppResult,
};
use consulta_db::RetryPolicy;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Largest history page served at once
pub const MAX_HISTORY: i64 = 200;

pub struct BalanceService {
    balances: Arc<dyn BalanceRepository>,
    retry: RetryPolicy,
}

impl BalanceService {
    pub fn new(balances: Arc<dyn BalanceRepository>, retry: RetryPolicy) -> Self {
        Self { balances, retry }
    }

    /// Credit `amount` once per `dedup_key`
    ///
    /// A key that was already applied returns the current balance with
    /// `applied = false` and credits nothing.
    #[instrument(skip(self, reason))]
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        reason: &str,
        dedup_key: &str,
    ) -> AppResult<BalanceOutcome> {
        ensure_positive(amount)?;
        if dedup_key.trim().is_empty() {
            return Err(AppError::MissingField("dedup_key".to_string()));
        }

        let change = BalanceChange::credit(
            user_id,
            amount,
            BalanceKind::Adjustment,
            reason,
            dedup_key.trim(),
        );
        let outcome = self
            .retry
            .run("balance credit", || self.balances.apply(&change))
            .await?;

        if outcome.applied {
            info!("Credited {} to {} ({})", amount, user_id, reason);
        } else {
            info!("Credit {} for {} already applied", dedup_key, user_id);
        }
        Ok(outcome)
    }

    /// Debit `amount`, failing with `InsufficientBalance` rather than going negative
    #[instrument(skip(self, reason))]
    pub async fn debit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        reason: &str,
    ) -> AppResult<BalanceOutcome> {
        ensure_positive(amount)?;

        // Keyed once so a retried attempt cannot debit twice
        let change = BalanceChange::debit(
            user_id,
            amount,
            BalanceKind::Adjustment,
            reason,
            Some(format!("debit:{}", Uuid::new_v4())),
        );
        let outcome = self
            .retry
            .run("balance debit", || self.balances.apply(&change))
            .await?;

        info!("Debited {} from {} ({})", amount, user_id, reason);
        Ok(outcome)
    }

    pub async fn balance(&self, user_id: Uuid) -> AppResult<Decimal> {
        self.balances.balance(user_id).await
    }

    /// Most recent balance transactions, newest first
    pub async fn history(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<BalanceTransaction>> {
        self.balances
            .history(user_id, limit.clamp(1, MAX_HISTORY))
            .await
    }
}

fn ensure_positive(amount: Decimal) -> AppResult<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use consulta_db::MemoryStore;
    use rust_decimal_macros::dec;

    fn service(store: &MemoryStore) -> BalanceService {
        BalanceService::new(store.repositories().balances, RetryPolicy::none())
    }

    #[tokio::test]
    async fn test_duplicate_credit_applies_once() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.add_user(user, Decimal::ZERO);
        let balances = service(&store);

        let first = balances.credit(user, dec!(5), "bonus", "promo:1").await.unwrap();
        let second = balances.credit(user, dec!(5), "bonus", "promo:1").await.unwrap();

        assert!(first.applied);
        assert!(!second.applied);
        assert_eq!(balances.balance(user).await.unwrap(), dec!(5));
        assert_eq!(store.balance_log().len(), 1);
    }

    #[tokio::test]
    async fn test_debit_below_zero_is_rejected() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.add_user(user, dec!(3));
        let balances = service(&store);

        let result = balances.debit(user, dec!(3.01), "correction").await;
        assert!(matches!(result, Err(AppError::InsufficientBalance { .. })));
        assert_eq!(balances.balance(user).await.unwrap(), dec!(3));

        let outcome = balances.debit(user, dec!(3), "correction").await.unwrap();
        assert_eq!(outcome.balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_non_positive_amounts_are_rejected() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.add_user(user, dec!(1));
        let balances = service(&store);

        assert!(matches!(
            balances.credit(user, Decimal::ZERO, "x", "k").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            balances.debit(user, dec!(-1), "x").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            balances.credit(user, dec!(1), "x", "  ").await,
            Err(AppError::MissingField(_))
        ));
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.add_user(user, Decimal::ZERO);
        let balances = service(&store);

        balances.credit(user, dec!(1), "a", "k1").await.unwrap();
        balances.credit(user, dec!(2), "b", "k2").await.unwrap();
        balances.debit(user, dec!(0.5), "c").await.unwrap();

        let history = balances.history(user, 10).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].amount, dec!(-0.5));
        assert_eq!(history[0].new_balance, dec!(2.5));
        assert_eq!(history[2].previous_balance, Decimal::ZERO);

        assert_eq!(balances.history(user, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_credits_serialize() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.add_user(user, Decimal::ZERO);
        let balances = Arc::new(service(&store));

        let mut handles = Vec::new();
        for i in 0..20 {
            let balances = balances.clone();
            handles.push(tokio::spawn(async move {
                balances
                    .credit(user, dec!(0.14), "call", &format!("k{}", i))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(balances.balance(user).await.unwrap(), dec!(2.80));
    }
}
