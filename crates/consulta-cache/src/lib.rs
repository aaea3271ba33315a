//! Redis-backed cache for Consulta
//!
//! Implements `CacheService` for two concerns: short-lived earnings snapshots
//! (string keys with a TTL) and the counselor presence sets the matching
//! dispatcher claims from. [`MemoryCache`] offers the same contract in
//! process, for tests and local runs.
//!
//! ```no_run
//! use consulta_cache::{get_json, set_json, RedisCache};
//!
//! # async fn demo() -> Result<(), consulta_core::AppError> {
//! let cache = RedisCache::new("redis://127.0.0.1:6379").await?;
//! set_json(&cache, "earnings:demo", &42u32, 60).await?;
//! let cached: Option<u32> = get_json(&cache, "earnings:demo").await?;
//! assert_eq!(cached, Some(42));
//! # Ok(())
//! # }
//! ```

pub mod keys;
mod memory;

pub use memory::MemoryCache;

use async_trait::async_trait;
use consulta_core::error::AppError;
use consulta_core::traits::CacheService;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info, warn};

/// Multiplexed Redis connection; clones share the underlying connection
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Connect and verify the server answers
    ///
    /// `CacheConnection` if the URL is invalid or the server is unreachable.
    pub async fn new(url: &str) -> Result<Self, AppError> {
        let client = Client::open(url)
            .map_err(|e| AppError::CacheConnection(format!("invalid Redis URL: {}", e)))?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Redis connection failed: {}", e);
            AppError::CacheConnection(e.to_string())
        })?;

        let cache = Self { manager };
        cache.ping().await?;
        info!("Connected to Redis");
        Ok(cache)
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_redis_error)?;
        Ok(())
    }

    /// Test use only
    #[cfg(test)]
    pub async fn flush_db(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_redis_error)?;
        Ok(())
    }

    /// Connection-level failures become `CacheConnection` so callers on a
    /// degradable path (earnings) can tell an outage from a bad value.
    fn map_redis_error(err: RedisError) -> AppError {
        if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
            warn!("Redis unavailable: {}", err);
            AppError::CacheConnection(err.to_string())
        } else {
            error!("Redis command failed: {}", err);
            AppError::Cache(err.to_string())
        }
    }
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, AppError> {
        debug!("GET {}", key);
        let mut conn = self.manager.clone();

        let result: Option<String> = conn.get(key).await.map_err(Self::map_redis_error)?;
        Ok(result)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), AppError> {
        debug!("SET {} (TTL: {}s)", key, ttl_secs);
        let mut conn = self.manager.clone();

        let _: () = conn
            .set_ex(key, value, ttl_secs)
            .await
            .map_err(Self::map_redis_error)?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        debug!("DEL {}", key);
        let mut conn = self.manager.clone();

        let deleted: i32 = conn.del(key).await.map_err(Self::map_redis_error)?;
        Ok(deleted > 0)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, AppError> {
        debug!("SADD {} {}", key, member);
        let mut conn = self.manager.clone();

        let added: i32 = conn
            .sadd(key, member)
            .await
            .map_err(Self::map_redis_error)?;

        Ok(added > 0)
    }

    /// SREM is atomic on the server, so of several concurrent removals of
    /// one member exactly one observes `true`.
    async fn srem(&self, key: &str, member: &str) -> Result<bool, AppError> {
        debug!("SREM {} {}", key, member);
        let mut conn = self.manager.clone();

        let removed: i32 = conn
            .srem(key, member)
            .await
            .map_err(Self::map_redis_error)?;

        Ok(removed > 0)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, AppError> {
        debug!("SMEMBERS {}", key);
        let mut conn = self.manager.clone();

        let members: Vec<String> = conn.smembers(key).await.map_err(Self::map_redis_error)?;
        Ok(members)
    }
}

/// Read a JSON value from the cache
///
/// Returns `Ok(None)` on a miss and `AppError::Serialization` if the stored
/// value does not decode as `T`.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn CacheService,
    key: &str,
) -> Result<Option<T>, AppError> {
    match cache.get_raw(key).await? {
        Some(json) => {
            let value = serde_json::from_str::<T>(&json).map_err(|e| {
                error!("Failed to deserialize value for key {}: {}", key, e);
                AppError::Serialization(format!("Deserialization failed: {}", e))
            })?;
            debug!("Cache HIT: {}", key);
            Ok(Some(value))
        }
        None => {
            debug!("Cache MISS: {}", key);
            Ok(None)
        }
    }
}

/// Store a value as JSON with a TTL
pub async fn set_json<T: Serialize + ?Sized>(
    cache: &dyn CacheService,
    key: &str,
    value: &T,
    ttl_secs: u64,
) -> Result<(), AppError> {
    let json = serde_json::to_string(value).map_err(|e| {
        error!("Failed to serialize value for key {}: {}", key, e);
        AppError::Serialization(format!("Serialization failed: {}", e))
    })?;

    cache.set_raw(key, &json, ttl_secs).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Snapshot {
        payee: String,
        total: String,
    }

    async fn setup_cache() -> RedisCache {
        let cache = RedisCache::new("redis://127.0.0.1:6379")
            .await
            .expect("Failed to connect to Redis");
        cache.flush_db().await.expect("Failed to flush DB");
        cache
    }

    #[tokio::test]
    async fn test_json_helpers_round_trip_through_memory_cache() {
        let cache = MemoryCache::new();
        let snapshot = Snapshot {
            payee: "p1".to_string(),
            total: "0.84".to_string(),
        };

        set_json(&cache, "earnings:p1", &snapshot, 60).await.unwrap();
        let loaded: Option<Snapshot> = get_json(&cache, "earnings:p1").await.unwrap();
        assert_eq!(loaded, Some(snapshot));

        let missing: Option<Snapshot> = get_json(&cache, "earnings:p2").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_get_json_reports_undecodable_value() {
        let cache = MemoryCache::new();
        cache.set_raw("earnings:p1", "not json", 60).await.unwrap();

        let result: Result<Option<Snapshot>, _> = get_json(&cache, "earnings:p1").await;
        assert!(matches!(result, Err(AppError::Serialization(_))));
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_ping() {
        let cache = setup_cache().await;
        assert!(cache.ping().await.is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_set_get_and_delete() {
        let cache = setup_cache().await;

        cache.set_raw("test_key", "\"v\"", 60).await.unwrap();
        assert_eq!(
            cache.get_raw("test_key").await.unwrap(),
            Some("\"v\"".to_string())
        );

        assert!(cache.delete("test_key").await.unwrap());
        assert!(!cache.delete("test_key").await.unwrap());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_set_operations() {
        let cache = setup_cache().await;

        assert!(cache.sadd(keys::AVAILABLE_COUNSELORS_KEY, "c1").await.unwrap());
        assert!(!cache.sadd(keys::AVAILABLE_COUNSELORS_KEY, "c1").await.unwrap());
        assert_eq!(
            cache.smembers(keys::AVAILABLE_COUNSELORS_KEY).await.unwrap(),
            vec!["c1".to_string()]
        );

        assert!(cache.srem(keys::AVAILABLE_COUNSELORS_KEY, "c1").await.unwrap());
        assert!(!cache.srem(keys::AVAILABLE_COUNSELORS_KEY, "c1").await.unwrap());
    }
}
