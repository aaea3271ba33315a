//! Referral management
//!
//! A referral ties a referred user to the referrer who brought them in,
//! through a short shareable code. Calls placed with an ACTIVE code pay the
//! referrer a share of the call cost.

use crate::audit;
use consulta_core::{
    models::{AuditLog, Referral, ReferralEarnings, ReferralStatus, REFERRAL_CODE_LEN},
    traits::{AuditRepository, LedgerRepository, ReferralRepository},
    AppError, AppResult,
};
use rand::Rng;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Code alphabet without the easily confused 0/O and 1/I
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const MAX_CODE_ATTEMPTS: usize = 5;

/// Random referral code
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERRAL_CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub struct ReferralService {
    referrals: Arc<dyn ReferralRepository>,
    ledger: Arc<dyn LedgerRepository>,
    audit: Arc<dyn AuditRepository>,
}

impl ReferralService {
    pub fn new(
        referrals: Arc<dyn ReferralRepository>,
        ledger: Arc<dyn LedgerRepository>,
        audit: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            referrals,
            ledger,
            audit,
        }
    }

    /// Create a referral with a fresh unique code
    #[instrument(skip(self))]
    pub async fn create(&self, referrer_id: Uuid, referred_id: Uuid) -> AppResult<Referral> {
        if referrer_id == referred_id {
            return Err(AppError::Validation("users cannot refer themselves".to_string()));
        }
        if self.referrals.find_by_referred(referred_id).await?.is_some() {
            return Err(AppError::AlreadyExists(format!(
                "user {} has already been referred",
                referred_id
            )));
        }

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = generate_code();
            if self.referrals.find_by_code(&code).await?.is_some() {
                debug!("Referral code collision on attempt {}", attempt);
                continue;
            }

            // A concurrent insert can still take the code between the check
            // and the insert; the unique index turns that into AlreadyExists.
            match self
                .referrals
                .create(&Referral::new(referrer_id, referred_id, code))
                .await
            {
                Ok(referral) => {
                    info!(
                        "Referral {} created: {} referred {}",
                        referral.code, referrer_id, referred_id
                    );
                    audit(
                        self.audit.as_ref(),
                        AuditLog::builder()
                            .actor_id(referrer_id)
                            .action("referral.created")
                            .entity_type("referral")
                            .entity_id(referral.id)
                            .details(json!({
                                "code": referral.code,
                                "referred_id": referred_id,
                            })),
                    )
                    .await;
                    return Ok(referral);
                }
                Err(AppError::AlreadyExists(_)) if attempt < MAX_CODE_ATTEMPTS => {
                    if self.referrals.find_by_referred(referred_id).await?.is_some() {
                        return Err(AppError::AlreadyExists(format!(
                            "user {} has already been referred",
                            referred_id
                        )));
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Internal(
            "could not allocate a unique referral code".to_string(),
        ))
    }

    /// Referral for `code` if it exists and is ACTIVE
    pub async fn resolve_active(&self, code: &str) -> AppResult<Option<Referral>> {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Ok(None);
        }
        Ok(self
            .referrals
            .find_by_code(&code)
            .await?
            .filter(Referral::is_active))
    }

    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        referral_id: Uuid,
        status: ReferralStatus,
        actor_id: Uuid,
    ) -> AppResult<Referral> {
        let referral = self
            .referrals
            .set_status(referral_id, status)
            .await?
            .ok_or_else(|| AppError::ReferralNotFound(referral_id.to_string()))?;

        info!("Referral {} set to {} by {}", referral.code, status, actor_id);
        audit(
            self.audit.as_ref(),
            AuditLog::builder()
                .actor_id(actor_id)
                .action("referral.status_changed")
                .entity_type("referral")
                .entity_id(referral.id)
                .details(json!({ "status": status })),
        )
        .await;

        Ok(referral)
    }

    pub async fn find(&self, referral_id: Uuid) -> AppResult<Referral> {
        self.referrals
            .find_by_id(referral_id)
            .await?
            .ok_or_else(|| AppError::ReferralNotFound(referral_id.to_string()))
    }

    pub async fn list_by_referrer(&self, referrer_id: Uuid) -> AppResult<Vec<Referral>> {
        self.referrals.list_by_referrer(referrer_id).await
    }

    /// REFERRER settlement earnings per code
    pub async fn earnings(&self, referrer_id: Uuid) -> AppResult<Vec<ReferralEarnings>> {
        self.ledger.referral_earnings(referrer_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consulta_db::MemoryStore;
    use rust_decimal::Decimal;

    fn service(store: &MemoryStore) -> ReferralService {
        let repos = store.repositories();
        ReferralService::new(repos.referrals, repos.ledger, repos.audit)
    }

    fn users(store: &MemoryStore, n: usize) -> Vec<Uuid> {
        (0..n)
            .map(|_| {
                let id = Uuid::new_v4();
                store.add_user(id, Decimal::ZERO);
                id
            })
            .collect()
    }

    #[test]
    fn test_generated_code_shape() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), REFERRAL_CODE_LEN);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[tokio::test]
    async fn test_create_and_resolve() {
        let store = MemoryStore::new();
        let ids = users(&store, 2);
        let referrals = service(&store);

        let referral = referrals.create(ids[0], ids[1]).await.unwrap();
        assert!(referral.is_active());

        let resolved = referrals
            .resolve_active(&format!(" {} ", referral.code.to_lowercase()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, referral.id);

        assert!(referrals.resolve_active("ZZZZZZZZ").await.unwrap().is_none());
        assert!(referrals.resolve_active("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_self_and_double_referral_rejected() {
        let store = MemoryStore::new();
        let ids = users(&store, 3);
        let referrals = service(&store);

        assert!(matches!(
            referrals.create(ids[0], ids[0]).await,
            Err(AppError::Validation(_))
        ));

        referrals.create(ids[0], ids[1]).await.unwrap();
        assert!(matches!(
            referrals.create(ids[2], ids[1]).await,
            Err(AppError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_inactive_code_does_not_resolve() {
        let store = MemoryStore::new();
        let ids = users(&store, 3);
        let referrals = service(&store);
        let referral = referrals.create(ids[0], ids[1]).await.unwrap();

        let updated = referrals
            .set_status(referral.id, ReferralStatus::Inactive, ids[2])
            .await
            .unwrap();
        assert_eq!(updated.status, ReferralStatus::Inactive);
        assert!(referrals
            .resolve_active(&referral.code)
            .await
            .unwrap()
            .is_none());

        referrals
            .set_status(referral.id, ReferralStatus::Active, ids[2])
            .await
            .unwrap();
        assert!(referrals
            .resolve_active(&referral.code)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_set_status_unknown_referral() {
        let store = MemoryStore::new();
        let referrals = service(&store);
        let result = referrals
            .set_status(Uuid::new_v4(), ReferralStatus::Inactive, Uuid::new_v4())
            .await;
        assert!(matches!(result, Err(AppError::ReferralNotFound(_))));
    }
}
