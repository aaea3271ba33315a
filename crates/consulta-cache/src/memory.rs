//! In-process cache backend
//!
//! Same contract as [`RedisCache`](crate::RedisCache), held in a mutex-guarded
//! map. TTLs are honoured on read. Used by tests and single-node local runs.

use async_trait::async_trait;
use consulta_core::error::AppError;
use consulta_core::traits::CacheService;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Entries {
    values: HashMap<String, (String, Instant)>,
    sets: HashMap<String, HashSet<String>>,
}

/// Mutex-backed `CacheService`
#[derive(Clone, Default)]
pub struct MemoryCache {
    inner: Arc<Mutex<Entries>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with `CacheConnection` until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::CacheConnection("cache unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, AppError> {
        self.check_available()?;
        let mut entries = self.inner.lock();

        match entries.values.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                entries.values.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set_raw(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), AppError> {
        self.check_available()?;
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.inner
            .lock()
            .values
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        self.check_available()?;
        let mut entries = self.inner.lock();
        let removed_value = entries.values.remove(key).is_some();
        let removed_set = entries.sets.remove(key).is_some();
        Ok(removed_value || removed_set)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, AppError> {
        self.check_available()?;
        Ok(self
            .inner
            .lock()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, AppError> {
        self.check_available()?;
        let mut entries = self.inner.lock();
        Ok(entries
            .sets
            .get_mut(key)
            .map(|set| set.remove(member))
            .unwrap_or(false))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, AppError> {
        self.check_available()?;
        let entries = self.inner.lock();
        let mut members: Vec<String> = entries
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_expired_values_read_as_missing() {
        let cache = MemoryCache::new();
        cache.set_raw("k", "v", 0).await.unwrap();
        assert_eq!(cache.get_raw("k").await.unwrap(), None);

        cache.set_raw("k", "v", 60).await.unwrap();
        assert_eq!(cache.get_raw("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_srem_succeeds_once() {
        let cache = MemoryCache::new();
        cache.sadd("s", "a").await.unwrap();

        let first = cache.srem("s", "a").await.unwrap();
        let second = cache.srem("s", "a").await.unwrap();
        assert!(first);
        assert!(!second);
        assert!(cache.smembers("s").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_cache_fails_every_call() {
        let cache = MemoryCache::new();
        cache.set_unavailable(true);
        assert!(matches!(
            cache.get_raw("k").await,
            Err(AppError::CacheConnection(_))
        ));
        assert!(cache.sadd("s", "a").await.is_err());

        cache.set_unavailable(false);
        assert!(cache.sadd("s", "a").await.unwrap());
    }
}
