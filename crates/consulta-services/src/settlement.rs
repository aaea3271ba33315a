//! Settlement ledger service
//!
//! Turns a closed call and its revenue split into settlement rows and payee
//! credits. The rows, the call's terminal fields and the credits are written
//! by a single `LedgerRepository::settle_call` transaction; this service
//! decides who the payees are and retries transient storage failures.

use consulta_core::{
    models::{
        CallClosing, NewSettlement, ReferralEarnings, Settlement, SettlementFilter,
        SettlementSummary,
    },
    traits::{LedgerRepository, SettleOutcome},
    AppError, AppResult, RevenueSplit,
};
use consulta_db::RetryPolicy;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Parties paid out of one call
#[derive(Debug, Clone, Copy)]
pub struct Payees {
    pub counselor_id: Uuid,
    /// Owner of the call's referral, if it was ACTIVE when the call ended
    pub referrer_id: Option<Uuid>,
}

pub struct SettlementService {
    ledger: Arc<dyn LedgerRepository>,
    company_account_id: Uuid,
    retry: RetryPolicy,
}

impl SettlementService {
    pub fn new(
        ledger: Arc<dyn LedgerRepository>,
        company_account_id: Uuid,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            ledger,
            company_account_id,
            retry,
        }
    }

    pub fn company_account_id(&self) -> Uuid {
        self.company_account_id
    }

    /// Record the settlement of one call
    ///
    /// Writes one COUNSELOR row, one REFERRER row when `payees` names a
    /// referrer and the split has a referrer share, and one COMPANY row paid
    /// to the configured company account. Safe to repeat: a call that is
    /// already ENDED yields `AlreadySettled` with the rows written the first
    /// time.
    #[instrument(skip(self, split), fields(call_id = %closing.call_id, cost = %closing.cost))]
    pub async fn record_settlement(
        &self,
        closing: &CallClosing,
        payees: Payees,
        split: &RevenueSplit,
    ) -> AppResult<SettleOutcome> {
        if split.total != closing.cost {
            return Err(AppError::Internal(format!(
                "split total {} does not match call cost {}",
                split.total, closing.cost
            )));
        }

        let entries = NewSettlement::from_split(
            closing.call_id,
            payees.counselor_id,
            payees.referrer_id,
            self.company_account_id,
            split,
        );

        let outcome = self
            .retry
            .run("settle_call", || self.ledger.settle_call(closing, &entries))
            .await?;

        match &outcome {
            SettleOutcome::Settled(rows) => info!(
                "Settled call {} into {} rows ({} total)",
                closing.call_id,
                rows.len(),
                closing.cost
            ),
            SettleOutcome::AlreadySettled(_) => {
                info!("Call {} was already settled", closing.call_id)
            }
            SettleOutcome::Cancelled => {
                info!("Call {} was cancelled before settling", closing.call_id)
            }
        }

        Ok(outcome)
    }

    /// Rows written for a call, or `None` if it was never settled
    #[instrument(skip(self))]
    pub async fn summary_for_call(&self, call_id: Uuid) -> AppResult<Option<SettlementSummary>> {
        let rows = self.find_by_call(call_id).await?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(SettlementSummary::from_rows(call_id, &rows)))
    }

    pub async fn find_by_call(&self, call_id: Uuid) -> AppResult<Vec<Settlement>> {
        self.ledger.find_by_call(call_id).await
    }

    pub async fn sum_for_payee(
        &self,
        payee_id: Uuid,
        filter: &SettlementFilter,
    ) -> AppResult<Decimal> {
        self.ledger.sum_for_payee(payee_id, filter).await
    }

    pub async fn referral_earnings(&self, referrer_id: Uuid) -> AppResult<Vec<ReferralEarnings>> {
        self.ledger.referral_earnings(referrer_id).await
    }
}
