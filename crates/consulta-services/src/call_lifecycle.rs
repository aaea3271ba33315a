//! Call lifecycle tracker
//!
//! Drives a call through `INITIATED → CONNECTING → ACTIVE → ENDED`, with
//! `CANCELLED` reachable from every non-terminal state. Ending a call prices
//! it, splits the cost and settles it through the ledger in one storage
//! transaction. Repeated end and cancel requests are answered from the
//! stored state instead of failing.

use crate::{EarningsService, MatchingService, Payees, ReferralService, SettlementService};
use chrono::Utc;
use consulta_core::{
    models::{Call, CallClosing, CallStatus, SettlementSummary},
    traits::{CallRepository, SettleOutcome},
    AppError, AppResult, Tariff,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Hands out voice transport channel identifiers for new calls
pub trait VoiceChannelAllocator: Send + Sync {
    fn allocate(&self, caller_id: Uuid, counselor_id: Uuid) -> String;
}

/// `{prefix}-{random id}` channel names
#[derive(Debug, Clone)]
pub struct PrefixedChannelAllocator {
    prefix: String,
}

impl PrefixedChannelAllocator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl VoiceChannelAllocator for PrefixedChannelAllocator {
    fn allocate(&self, _caller_id: Uuid, _counselor_id: Uuid) -> String {
        format!("{}-{}", self.prefix, Uuid::new_v4().simple())
    }
}

/// Result of ending a call
#[derive(Debug, Clone)]
pub struct CallEndResult {
    pub call: Call,
    /// `None` when the call was cancelled and never settled
    pub settlement: Option<SettlementSummary>,
    /// True when the call had already ended before this request
    pub already_settled: bool,
}

pub struct CallLifecycleService {
    calls: Arc<dyn CallRepository>,
    referrals: Arc<ReferralService>,
    settlement: Arc<SettlementService>,
    matching: Arc<MatchingService>,
    earnings: Arc<EarningsService>,
    tariff: Tariff,
    channels: Arc<dyn VoiceChannelAllocator>,
}

impl CallLifecycleService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        calls: Arc<dyn CallRepository>,
        referrals: Arc<ReferralService>,
        settlement: Arc<SettlementService>,
        matching: Arc<MatchingService>,
        earnings: Arc<EarningsService>,
        tariff: Tariff,
        channels: Arc<dyn VoiceChannelAllocator>,
    ) -> Self {
        Self {
            calls,
            referrals,
            settlement,
            matching,
            earnings,
            tariff,
            channels,
        }
    }

    /// Create an INITIATED call
    ///
    /// An unknown or inactive referral code is ignored and the call goes
    /// ahead without a referral. A counselor claimed by someone else's match
    /// or call is a `Conflict`.
    #[instrument(skip(self, referral_code))]
    pub async fn create(
        &self,
        caller_id: Uuid,
        counselor_id: Uuid,
        referral_code: Option<&str>,
    ) -> AppResult<Call> {
        if caller_id == counselor_id {
            return Err(AppError::Validation(
                "caller and counselor must be different users".to_string(),
            ));
        }

        let referral_id = match referral_code {
            Some(code) => match self.referrals.resolve_active(code).await? {
                Some(referral) => Some(referral.id),
                None => {
                    warn!("Ignoring unknown or inactive referral code {:?}", code);
                    None
                }
            },
            None => None,
        };

        let channel_id = self.channels.allocate(caller_id, counselor_id);
        let call = Call::new(caller_id, counselor_id, referral_id, channel_id);
        self.claim_counselor(&call).await?;

        let call = match self.calls.create(&call).await {
            Ok(created) => created,
            Err(e) => {
                self.release_counselor(&call).await;
                return Err(e);
            }
        };

        info!(
            "Call {} created: {} -> {} on {}",
            call.id, caller_id, counselor_id, call.channel_id
        );
        Ok(call)
    }

    pub async fn get(&self, call_id: Uuid) -> AppResult<Call> {
        self.calls
            .find_by_id(call_id)
            .await?
            .ok_or_else(|| AppError::CallNotFound(call_id.to_string()))
    }

    /// INITIATED → CONNECTING
    #[instrument(skip(self))]
    pub async fn mark_connecting(&self, call_id: Uuid) -> AppResult<Call> {
        let call = self.get(call_id).await?;
        match call.status {
            CallStatus::Connecting => return Ok(call),
            CallStatus::Initiated => {}
            status => return Err(invalid_transition(call_id, status, "connecting")),
        }

        match self.calls.mark_connecting(call_id).await? {
            Some(call) => {
                debug!("Call {} connecting", call_id);
                Ok(call)
            }
            // Lost a race with another transition
            None => {
                let call = self.get(call_id).await?;
                if call.status == CallStatus::Connecting {
                    Ok(call)
                } else {
                    Err(invalid_transition(call_id, call.status, "connecting"))
                }
            }
        }
    }

    /// INITIATED | CONNECTING → ACTIVE, stamping `started_at`
    ///
    /// Activating an ACTIVE call returns it unchanged.
    #[instrument(skip(self))]
    pub async fn transition_to_active(&self, call_id: Uuid) -> AppResult<Call> {
        let call = self.get(call_id).await?;
        match call.status {
            CallStatus::Active => return Ok(call),
            status if status.is_terminal() => {
                return Err(invalid_transition(call_id, status, "active"))
            }
            _ => {}
        }

        match self.calls.activate(call_id, Utc::now()).await? {
            Some(call) => {
                info!("Call {} active", call_id);
                Ok(call)
            }
            None => {
                let call = self.get(call_id).await?;
                if call.status == CallStatus::Active {
                    Ok(call)
                } else {
                    Err(invalid_transition(call_id, call.status, "active"))
                }
            }
        }
    }

    /// End and settle a call
    ///
    /// Ending an ENDED call returns the settlement written the first time.
    /// Ending a CANCELLED call returns it with no settlement.
    #[instrument(skip(self))]
    pub async fn end(&self, call_id: Uuid) -> AppResult<CallEndResult> {
        let call = self.get(call_id).await?;

        match call.status {
            CallStatus::Cancelled => {
                return Ok(CallEndResult {
                    call,
                    settlement: None,
                    already_settled: false,
                })
            }
            CallStatus::Ended => {
                // Finishes a release an earlier end may have missed
                self.release_counselor(&call).await;
                let settlement = self.settlement.summary_for_call(call_id).await?;
                return Ok(CallEndResult {
                    call,
                    settlement,
                    already_settled: true,
                });
            }
            _ => {}
        }

        let ended_at = Utc::now();
        let duration_seconds = call
            .elapsed_seconds(ended_at)
            .ok_or_else(|| AppError::CallNotStarted(call_id.to_string()))?;
        let cost = self
            .tariff
            .call_cost(Tariff::duration_minutes(duration_seconds));

        let referrer_id = self.active_referrer(&call).await?;
        let split = self.tariff.split(cost, referrer_id.is_some());

        let closing = CallClosing {
            call_id,
            ended_at,
            duration_seconds,
            cost,
        };
        let payees = Payees {
            counselor_id: call.counselor_id,
            referrer_id,
        };

        let (settlement, already_settled) = match self
            .settlement
            .record_settlement(&closing, payees, &split)
            .await?
        {
            SettleOutcome::Settled(rows) => {
                (Some(SettlementSummary::from_rows(call_id, &rows)), false)
            }
            SettleOutcome::AlreadySettled(rows) => {
                let summary = (!rows.is_empty()).then(|| SettlementSummary::from_rows(call_id, &rows));
                (summary, true)
            }
            SettleOutcome::Cancelled => (None, false),
        };

        let call = self.get(call_id).await?;
        self.release_counselor(&call).await;

        if settlement.is_some() && !already_settled {
            let mut payees = vec![call.counselor_id, self.settlement.company_account_id()];
            payees.extend(referrer_id);
            for payee in payees {
                self.earnings.invalidate(payee).await;
            }
        }

        Ok(CallEndResult {
            call,
            settlement,
            already_settled,
        })
    }

    /// Cancel a call that has not ended. Nothing is settled.
    #[instrument(skip(self))]
    pub async fn cancel(&self, call_id: Uuid) -> AppResult<Call> {
        let call = self.get(call_id).await?;
        match call.status {
            CallStatus::Cancelled => return Ok(call),
            CallStatus::Ended => return Err(invalid_transition(call_id, call.status, "cancelled")),
            _ => {}
        }

        let call = match self.calls.cancel(call_id).await? {
            Some(call) => call,
            None => {
                let call = self.get(call_id).await?;
                if call.status != CallStatus::Cancelled {
                    return Err(invalid_transition(call_id, call.status, "cancelled"));
                }
                call
            }
        };

        info!("Call {} cancelled", call_id);
        self.release_counselor(&call).await;
        Ok(call)
    }

    /// Settlement of a call, `None` until it has ended
    pub async fn settlement(&self, call_id: Uuid) -> AppResult<Option<SettlementSummary>> {
        self.get(call_id).await?;
        self.settlement.summary_for_call(call_id).await
    }

    /// Referrer to pay for this call, if its referral is still ACTIVE
    async fn active_referrer(&self, call: &Call) -> AppResult<Option<Uuid>> {
        let Some(referral_id) = call.referral_id else {
            return Ok(None);
        };

        match self.referrals.find(referral_id).await {
            Ok(referral) if referral.is_active() => Ok(Some(referral.referrer_id)),
            Ok(_) => {
                debug!("Referral {} inactive, no referrer share", referral_id);
                Ok(None)
            }
            Err(AppError::ReferralNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Cache failures do not block the call; a call that never got the
    /// claim releases nobody.
    async fn claim_counselor(&self, call: &Call) -> AppResult<()> {
        match self
            .matching
            .bind_call(call.counselor_id, call.caller_id, call.id)
            .await
        {
            Err(AppError::Conflict(reason)) => Err(AppError::Conflict(reason)),
            Err(e) => {
                warn!(
                    "Could not claim counselor {} for call {}: {}",
                    call.counselor_id, call.id, e
                );
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    async fn release_counselor(&self, call: &Call) {
        if let Err(e) = self.matching.release_call(call.counselor_id, call.id).await {
            warn!(
                "Failed to release counselor {} from call {}: {}",
                call.counselor_id, call.id, e
            );
        }
    }
}

fn invalid_transition(call_id: Uuid, from: CallStatus, to: &str) -> AppError {
    AppError::InvalidState(format!("call {} is {}, cannot become {}", call_id, from, to))
}
