//! Counselor matching dispatcher
//!
//! Counselors announce presence into the available set. A match claims one
//! counselor by removing it from that set; the removal is atomic in the
//! cache, so when two callers race for the same counselor exactly one of them
//! wins and the other fails over to the next candidate. Claimed counselors
//! sit in the busy set until their call ends or is cancelled.
//!
//! Every claim has one owner, kept under `counselor_claim:{id}`: first the
//! matched caller, then the call that caller creates. Only the owning call
//! can release the counselor, and no other caller can open a call with a
//! claimed counselor.

use consulta_cache::keys::{
    counselor_claim_key, AVAILABLE_COUNSELORS_KEY, BUSY_COUNSELORS_KEY, COUNSELOR_CLAIM_TTL_SECS,
};
use consulta_core::{traits::CacheService, AppError, AppResult};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Counselor presence as reported by the counselor's client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Available,
    Offline,
}

/// Where the counselor ended up after a presence update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceState {
    Available,
    /// Still on a call; becomes available when the call is released
    Busy,
    Offline,
}

/// Match request
#[derive(Debug, Clone, Default)]
pub struct MatchRequest {
    pub caller_id: Uuid,
    /// Tried first when it is available
    pub preferred_counselor: Option<Uuid>,
    /// Counselors the caller already failed to reach
    pub exclude: Vec<Uuid>,
}

pub struct MatchingService {
    cache: Arc<dyn CacheService>,
}

impl MatchingService {
    pub fn new(cache: Arc<dyn CacheService>) -> Self {
        Self { cache }
    }

    /// Record a counselor's presence
    #[instrument(skip(self))]
    pub async fn set_presence(
        &self,
        counselor_id: Uuid,
        presence: Presence,
    ) -> AppResult<PresenceState> {
        let member = counselor_id.to_string();

        match presence {
            Presence::Available => {
                let busy = self.cache.smembers(BUSY_COUNSELORS_KEY).await?;
                if busy.contains(&member) {
                    debug!("Counselor {} is on a call, staying busy", counselor_id);
                    return Ok(PresenceState::Busy);
                }
                self.cache.sadd(AVAILABLE_COUNSELORS_KEY, &member).await?;
                Ok(PresenceState::Available)
            }
            Presence::Offline => {
                self.cache.srem(AVAILABLE_COUNSELORS_KEY, &member).await?;
                // A counselor who leaves mid-call is not put back on release
                self.cache.srem(BUSY_COUNSELORS_KEY, &member).await?;
                self.cache.delete(&counselor_claim_key(counselor_id)).await?;
                Ok(PresenceState::Offline)
            }
        }
    }

    /// Claim an idle counselor for a caller
    ///
    /// Candidates are the preferred counselor first, then every other
    /// available counselor in random order. Each claim is an atomic set
    /// removal; a lost claim moves on to the next candidate.
    #[instrument(skip(self, request), fields(caller_id = %request.caller_id))]
    pub async fn find_match(&self, request: &MatchRequest) -> AppResult<Uuid> {
        let available = self.cache.smembers(AVAILABLE_COUNSELORS_KEY).await?;

        let mut candidates: Vec<Uuid> = available
            .iter()
            .filter_map(|member| Uuid::parse_str(member).ok())
            .filter(|id| *id != request.caller_id && !request.exclude.contains(id))
            .collect();

        candidates.shuffle(&mut rand::thread_rng());

        if let Some(preferred) = request.preferred_counselor {
            if let Some(pos) = candidates.iter().position(|id| *id == preferred) {
                candidates.swap(0, pos);
            }
        }

        for candidate in candidates {
            let member = candidate.to_string();
            if self.cache.srem(AVAILABLE_COUNSELORS_KEY, &member).await? {
                self.set_owner(candidate, &caller_owner(request.caller_id))
                    .await?;
                self.cache.sadd(BUSY_COUNSELORS_KEY, &member).await?;
                info!("Matched caller {} with counselor {}", request.caller_id, candidate);
                return Ok(candidate);
            }
            debug!("Lost claim on counselor {}, failing over", candidate);
        }

        warn!("No counselor available for caller {}", request.caller_id);
        Err(AppError::NoCounselorAvailable)
    }

    /// Hand a counselor's claim to a new call
    ///
    /// An idle counselor is claimed for the call directly. A claimed
    /// counselor is only handed over when the claim is held by this call's
    /// caller from a match; anyone else gets `Conflict`. Counselors matching
    /// does not track (never announced, or offline) are left alone.
    #[instrument(skip(self))]
    pub async fn bind_call(
        &self,
        counselor_id: Uuid,
        caller_id: Uuid,
        call_id: Uuid,
    ) -> AppResult<()> {
        let member = counselor_id.to_string();

        if self.cache.srem(AVAILABLE_COUNSELORS_KEY, &member).await? {
            self.set_owner(counselor_id, &call_owner(call_id)).await?;
            self.cache.sadd(BUSY_COUNSELORS_KEY, &member).await?;
            debug!("Counselor {} claimed directly by call {}", counselor_id, call_id);
            return Ok(());
        }

        let busy = self.cache.smembers(BUSY_COUNSELORS_KEY).await?;
        if !busy.contains(&member) {
            return Ok(());
        }

        let owner = self.cache.get_raw(&counselor_claim_key(counselor_id)).await?;
        if owner.as_deref() != Some(caller_owner(caller_id).as_str()) {
            warn!(
                "Counselor {} is claimed by {:?}, refusing call {} from {}",
                counselor_id, owner, call_id, caller_id
            );
            return Err(AppError::Conflict(format!(
                "counselor {} is on another call",
                counselor_id
            )));
        }

        self.set_owner(counselor_id, &call_owner(call_id)).await?;
        debug!("Counselor {} bound to call {}", counselor_id, call_id);
        Ok(())
    }

    /// Return a counselor to the available set when the call holding their
    /// claim ends
    ///
    /// Calls that do not hold the claim release nothing. A counselor who
    /// went offline during the call stays offline.
    #[instrument(skip(self))]
    pub async fn release_call(&self, counselor_id: Uuid, call_id: Uuid) -> AppResult<bool> {
        let key = counselor_claim_key(counselor_id);
        let owner = self.cache.get_raw(&key).await?;
        if owner.as_deref() != Some(call_owner(call_id).as_str()) {
            debug!("Call {} holds no claim on counselor {}", call_id, counselor_id);
            return Ok(false);
        }

        self.cache.delete(&key).await?;
        let member = counselor_id.to_string();
        if !self.cache.srem(BUSY_COUNSELORS_KEY, &member).await? {
            return Ok(false);
        }
        self.cache.sadd(AVAILABLE_COUNSELORS_KEY, &member).await?;
        debug!("Counselor {} released by call {}", counselor_id, call_id);
        Ok(true)
    }

    /// Counselors currently available
    pub async fn available(&self) -> AppResult<Vec<Uuid>> {
        let members = self.cache.smembers(AVAILABLE_COUNSELORS_KEY).await?;
        Ok(members
            .iter()
            .filter_map(|member| Uuid::parse_str(member).ok())
            .collect())
    }

    async fn set_owner(&self, counselor_id: Uuid, owner: &str) -> AppResult<()> {
        self.cache
            .set_raw(
                &counselor_claim_key(counselor_id),
                owner,
                COUNSELOR_CLAIM_TTL_SECS,
            )
            .await
    }
}

fn caller_owner(caller_id: Uuid) -> String {
    format!("caller:{}", caller_id)
}

fn call_owner(call_id: Uuid) -> String {
    format!("call:{}", call_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use consulta_cache::MemoryCache;

    fn service() -> (MatchingService, MemoryCache) {
        let cache = MemoryCache::new();
        (MatchingService::new(Arc::new(cache.clone())), cache)
    }

    #[tokio::test]
    async fn test_preferred_counselor_is_claimed_first() {
        let (matching, _) = service();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        for id in [a, b, c] {
            matching.set_presence(id, Presence::Available).await.unwrap();
        }

        let request = MatchRequest {
            caller_id: Uuid::new_v4(),
            preferred_counselor: Some(b),
            exclude: vec![],
        };
        assert_eq!(matching.find_match(&request).await.unwrap(), b);
        assert!(!matching.available().await.unwrap().contains(&b));
    }

    #[tokio::test]
    async fn test_excluded_and_claimed_counselors_are_skipped() {
        let (matching, _) = service();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        matching.set_presence(a, Presence::Available).await.unwrap();
        matching.set_presence(b, Presence::Available).await.unwrap();

        let request = MatchRequest {
            caller_id: Uuid::new_v4(),
            preferred_counselor: None,
            exclude: vec![a],
        };
        assert_eq!(matching.find_match(&request).await.unwrap(), b);

        // b is now busy and a is excluded
        assert!(matches!(
            matching.find_match(&request).await,
            Err(AppError::NoCounselorAvailable)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_matches_never_share_a_counselor() {
        let (matching, _) = service();
        let matching = Arc::new(matching);
        let counselor = Uuid::new_v4();
        matching
            .set_presence(counselor, Presence::Available)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let matching = matching.clone();
            handles.push(tokio::spawn(async move {
                let request = MatchRequest {
                    caller_id: Uuid::new_v4(),
                    ..Default::default()
                };
                matching.find_match(&request).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_release_returns_counselor_unless_offline() {
        let (matching, _) = service();
        let counselor = Uuid::new_v4();
        matching
            .set_presence(counselor, Presence::Available)
            .await
            .unwrap();
        let request = MatchRequest {
            caller_id: Uuid::new_v4(),
            ..Default::default()
        };
        matching.find_match(&request).await.unwrap();
        let call = Uuid::new_v4();
        matching
            .bind_call(counselor, request.caller_id, call)
            .await
            .unwrap();

        assert_eq!(
            matching
                .set_presence(counselor, Presence::Available)
                .await
                .unwrap(),
            PresenceState::Busy
        );

        assert!(matching.release_call(counselor, call).await.unwrap());
        assert!(matching.available().await.unwrap().contains(&counselor));

        matching.find_match(&request).await.unwrap();
        let call = Uuid::new_v4();
        matching
            .bind_call(counselor, request.caller_id, call)
            .await
            .unwrap();
        matching
            .set_presence(counselor, Presence::Offline)
            .await
            .unwrap();
        assert!(!matching.release_call(counselor, call).await.unwrap());
        assert!(matching.available().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claimed_counselor_is_bound_only_by_matched_caller() {
        let (matching, _) = service();
        let counselor = Uuid::new_v4();
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        matching
            .set_presence(counselor, Presence::Available)
            .await
            .unwrap();
        let request = MatchRequest {
            caller_id: first,
            ..Default::default()
        };
        matching.find_match(&request).await.unwrap();

        assert!(matches!(
            matching.bind_call(counselor, second, Uuid::new_v4()).await,
            Err(AppError::Conflict(_))
        ));

        let call = Uuid::new_v4();
        matching.bind_call(counselor, first, call).await.unwrap();

        // The match is spent once the call holds the claim
        assert!(matches!(
            matching.bind_call(counselor, first, Uuid::new_v4()).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_only_the_owning_call_releases() {
        let (matching, _) = service();
        let counselor = Uuid::new_v4();
        let caller = Uuid::new_v4();
        matching
            .set_presence(counselor, Presence::Available)
            .await
            .unwrap();
        matching
            .find_match(&MatchRequest {
                caller_id: caller,
                ..Default::default()
            })
            .await
            .unwrap();
        let owner = Uuid::new_v4();
        matching.bind_call(counselor, caller, owner).await.unwrap();

        assert!(!matching
            .release_call(counselor, Uuid::new_v4())
            .await
            .unwrap());
        assert!(matching.available().await.unwrap().is_empty());

        assert!(matching.release_call(counselor, owner).await.unwrap());
        // A repeated release is a no-op
        assert!(!matching.release_call(counselor, owner).await.unwrap());
        assert_eq!(matching.available().await.unwrap(), vec![counselor]);
    }

    #[tokio::test]
    async fn test_direct_call_claims_idle_counselor() {
        let (matching, _) = service();
        let counselor = Uuid::new_v4();
        matching
            .set_presence(counselor, Presence::Available)
            .await
            .unwrap();

        let call = Uuid::new_v4();
        matching
            .bind_call(counselor, Uuid::new_v4(), call)
            .await
            .unwrap();
        assert!(matches!(
            matching
                .find_match(&MatchRequest {
                    caller_id: Uuid::new_v4(),
                    ..Default::default()
                })
                .await,
            Err(AppError::NoCounselorAvailable)
        ));

        // Untracked counselors are not claimed at all
        let untracked = Uuid::new_v4();
        matching
            .bind_call(untracked, Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap();
        assert!(!matching
            .release_call(untracked, Uuid::new_v4())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_cache_outage_surfaces_error() {
        let (matching, cache) = service();
        cache.set_unavailable(true);
        let request = MatchRequest {
            caller_id: Uuid::new_v4(),
            ..Default::default()
        };
        assert!(matches!(
            matching.find_match(&request).await,
            Err(AppError::CacheConnection(_))
        ));
    }
}
