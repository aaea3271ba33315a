//! Withdrawal and payout workflow
//!
//! Requests are validated against the balance but not debited. Approval
//! debits the balance and completes the request in one repository
//! transaction, re-checking the balance at that moment; rejection never
//! touches the balance. Both decisions are one-way and only legal from
//! PENDING.

use crate::audit;
use consulta_core::{
    config::PayoutsConfig,
    models::{
        AuditLog, CompletionMode, WithdrawalApproval, WithdrawalRejection, WithdrawalRequest,
        WithdrawalStatus,
    },
    traits::{AuditRepository, BalanceRepository, WithdrawalRepository},
    AppError, AppResult,
};
use consulta_db::RetryPolicy;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Decimal places of payout currency amounts
const PAYOUT_SCALE: u32 = 2;

/// Input of a withdrawal request
#[derive(Debug, Clone)]
pub struct NewWithdrawal {
    pub user_id: Uuid,
    pub balance_amount: Decimal,
    pub destination: String,
    pub network: String,
}

pub struct WithdrawalService {
    withdrawals: Arc<dyn WithdrawalRepository>,
    balances: Arc<dyn BalanceRepository>,
    audit: Arc<dyn AuditRepository>,
    min_withdrawal: Decimal,
    credits_per_unit: Decimal,
    retry: RetryPolicy,
}

impl WithdrawalService {
    pub fn new(
        withdrawals: Arc<dyn WithdrawalRepository>,
        balances: Arc<dyn BalanceRepository>,
        audit: Arc<dyn AuditRepository>,
        config: &PayoutsConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            withdrawals,
            balances,
            audit,
            min_withdrawal: config.min_withdrawal,
            credits_per_unit: config.credits_per_unit,
            retry,
        }
    }

    /// Payout currency amount for a balance amount, rounded half away from zero
    pub fn payout_amount(&self, balance_amount: Decimal) -> Decimal {
        (balance_amount / self.credits_per_unit)
            .round_dp_with_strategy(PAYOUT_SCALE, RoundingStrategy::MidpointAwayFromZero)
    }

    /// File a PENDING withdrawal request
    ///
    /// The balance must cover this request together with the user's other
    /// pending requests. Nothing is debited until approval.
    #[instrument(skip(self, input), fields(user_id = %input.user_id, amount = %input.balance_amount))]
    pub async fn request(&self, input: NewWithdrawal) -> AppResult<WithdrawalRequest> {
        let destination = input.destination.trim();
        let network = input.network.trim();

        if destination.is_empty() {
            return Err(AppError::MissingField("destination".to_string()));
        }
        if network.is_empty() {
            return Err(AppError::MissingField("network".to_string()));
        }
        if input.balance_amount <= Decimal::ZERO || input.balance_amount < self.min_withdrawal {
            return Err(AppError::Validation(format!(
                "withdrawal amount must be at least {}",
                self.min_withdrawal
            )));
        }

        let balance = self.balances.balance(input.user_id).await?;
        let pending: Decimal = self
            .withdrawals
            .list_by_user(input.user_id)
            .await?
            .iter()
            .filter(|w| w.status.is_pending())
            .map(|w| w.balance_amount)
            .sum();

        let available = balance - pending;
        if available < input.balance_amount {
            warn!(
                "Withdrawal of {} exceeds available {} for {}",
                input.balance_amount, available, input.user_id
            );
            return Err(AppError::InsufficientBalance {
                required: input.balance_amount.to_string(),
                available: available.max(Decimal::ZERO).to_string(),
            });
        }

        let request = WithdrawalRequest::new(
            input.user_id,
            input.balance_amount,
            self.payout_amount(input.balance_amount),
            destination.to_string(),
            network.to_string(),
        );
        let created = self.withdrawals.create(&request).await?;

        info!(
            "Withdrawal {} requested: {} ({} payout) to {} on {}",
            created.id, created.balance_amount, created.payout_amount, created.destination, created.network
        );
        audit(
            self.audit.as_ref(),
            AuditLog::builder()
                .actor_id(created.user_id)
                .action("withdrawal.requested")
                .entity_type("withdrawal_request")
                .entity_id(created.id)
                .details(json!({
                    "balance_amount": created.balance_amount,
                    "payout_amount": created.payout_amount,
                    "network": created.network,
                })),
        )
        .await;

        Ok(created)
    }

    /// Debit the balance and complete a PENDING request
    ///
    /// `CompletionMode::Auto` records a transfer already executed by the
    /// payout system and therefore requires its transaction hash.
    #[instrument(skip(self, tx_hash))]
    pub async fn approve(
        &self,
        withdrawal_id: Uuid,
        admin_id: Uuid,
        mode: CompletionMode,
        tx_hash: Option<String>,
    ) -> AppResult<WithdrawalRequest> {
        let tx_hash = tx_hash
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());
        if mode == CompletionMode::Auto && tx_hash.is_none() {
            return Err(AppError::MissingField("tx_hash".to_string()));
        }

        let approval = WithdrawalApproval {
            withdrawal_id,
            admin_id,
            mode,
            tx_hash,
        };
        let mut attempts = 0u32;
        let result = self
            .retry
            .run("complete withdrawal", || {
                attempts += 1;
                self.withdrawals.complete(&approval)
            })
            .await;
        let completed = match result {
            Err(AppError::Conflict(reason)) if attempts > 1 => self
                .decided_earlier(withdrawal_id, admin_id, mode.completed_status())
                .await?
                .ok_or(AppError::Conflict(reason))?,
            other => other?,
        };

        info!(
            "Withdrawal {} completed ({}) by {}",
            completed.id, completed.status, admin_id
        );
        audit(
            self.audit.as_ref(),
            AuditLog::builder()
                .actor_id(admin_id)
                .action("withdrawal.approved")
                .entity_type("withdrawal_request")
                .entity_id(completed.id)
                .details(json!({
                    "status": completed.status,
                    "balance_amount": completed.balance_amount,
                    "tx_hash": completed.tx_hash,
                })),
        )
        .await;

        Ok(completed)
    }

    /// Reject a PENDING request. The balance is not touched.
    #[instrument(skip(self, reason))]
    pub async fn reject(
        &self,
        withdrawal_id: Uuid,
        admin_id: Uuid,
        reason: &str,
    ) -> AppResult<WithdrawalRequest> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::MissingField("reason".to_string()));
        }

        let rejection = WithdrawalRejection {
            withdrawal_id,
            admin_id,
            reason: reason.to_string(),
        };
        let mut attempts = 0u32;
        let result = self
            .retry
            .run("reject withdrawal", || {
                attempts += 1;
                self.withdrawals.reject(&rejection)
            })
            .await;
        let rejected = match result {
            Err(AppError::Conflict(reason)) if attempts > 1 => self
                .decided_earlier(withdrawal_id, admin_id, WithdrawalStatus::Rejected)
                .await?
                .ok_or(AppError::Conflict(reason))?,
            other => other?,
        };

        info!("Withdrawal {} rejected by {}", rejected.id, admin_id);
        audit(
            self.audit.as_ref(),
            AuditLog::builder()
                .actor_id(admin_id)
                .action("withdrawal.rejected")
                .entity_type("withdrawal_request")
                .entity_id(rejected.id)
                .details(json!({ "reason": reason })),
        )
        .await;

        Ok(rejected)
    }

    pub async fn find(&self, withdrawal_id: Uuid) -> AppResult<WithdrawalRequest> {
        self.withdrawals
            .find_by_id(withdrawal_id)
            .await?
            .ok_or_else(|| AppError::WithdrawalNotFound(withdrawal_id.to_string()))
    }

    /// A retried decision that hits `Conflict` may be answering its own
    /// earlier attempt, committed but never acknowledged. The request is that
    /// attempt's result when it carries the same admin and status.
    async fn decided_earlier(
        &self,
        withdrawal_id: Uuid,
        admin_id: Uuid,
        status: WithdrawalStatus,
    ) -> AppResult<Option<WithdrawalRequest>> {
        let current = self.find(withdrawal_id).await?;
        if current.status == status && current.processed_by == Some(admin_id) {
            warn!(
                "Withdrawal {} was already {} by {} on an unacknowledged attempt",
                withdrawal_id, status, admin_id
            );
            Ok(Some(current))
        } else {
            Ok(None)
        }
    }
}
