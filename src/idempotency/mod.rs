//! The idempotency engine (spec §4.2): a lock-guarded, result-cached
//! wrapper around any mutating use case.
//!
//! ```text
//! 1. GET result:{key}        -> if present, return it, never call fn
//! 2. SET NX lock:{key} EX 30 -> if it fails, InProgress
//! 3. call fn
//!    success -> SET result:{key} EX 86400, DEL lock:{key}, return
//!    error   -> DEL lock:{key}, propagate (no caching on failure)
//! ```
//!
//! The lock-acquire check is a single `set_nx`, so it's atomic with lock
//! placement; no second check-after-acquire is needed, because step 1
//! already checked and step 3 is single-writer by mutual exclusion
//! (spec §4.2).

use {
    crate::{domain::error::ServiceError, domain::id::IdempotencyKey, ports::cache::Cache},
    serde::{de::DeserializeOwned, Serialize},
    std::{future::Future, time::Duration},
};

/// Lock TTL (spec §4.2 step 2).
pub const LOCK_TTL: Duration = Duration::from_secs(30);
/// Cached-result TTL (spec §4.2 step 3).
pub const RESULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Runs `f` under the idempotency engine. `T` must round-trip through JSON
/// since the cache only stores strings (spec §3 "idempotency record").
pub async fn with_idempotency<T, F, Fut>(
    cache: &dyn Cache,
    key: &IdempotencyKey,
    f: F,
) -> Result<T, ServiceError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let result_key = key.result_key();
    let lock_key = key.lock_key();

    if let Some(cached) = cache.get(&result_key).await? {
        let value: T = serde_json::from_str(&cached)?;
        return Ok(value);
    }

    let acquired = cache.set_nx(&lock_key, "1", LOCK_TTL).await?;
    if !acquired {
        return Err(ServiceError::InProgress);
    }

    let outcome = f().await;

    match outcome {
        Ok(value) => {
            let serialized = serde_json::to_string(&value)?;
            cache.set(&result_key, &serialized, RESULT_TTL).await?;
            cache.del(&lock_key).await?;
            Ok(value)
        }
        Err(err) => {
            cache.del(&lock_key).await?;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicU32, Ordering},
        sync::Mutex,
    };

    #[derive(Default)]
    struct FakeCache {
        entries: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl Cache for FakeCache {
        async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), ServiceError> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn set_nx(
            &self,
            key: &str,
            value: &str,
            _ttl: Duration,
        ) -> Result<bool, ServiceError> {
            let mut guard = self.entries.lock().unwrap();
            if guard.contains_key(key) {
                Ok(false)
            } else {
                guard.insert(key.to_string(), value.to_string());
                Ok(true)
            }
        }

        async fn exists(&self, key: &str) -> Result<bool, ServiceError> {
            Ok(self.entries.lock().unwrap().contains_key(key))
        }

        async fn del(&self, key: &str) -> Result<(), ServiceError> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Payload(u32);

    fn key() -> IdempotencyKey {
        IdempotencyKey::new(uuid::Uuid::now_v7())
    }

    #[tokio::test]
    async fn second_call_returns_cached_result_without_reexecuting() {
        let cache = FakeCache::default();
        let k = key();
        let calls = AtomicU32::new(0);

        let run = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ServiceError>(Payload(42))
        };

        let first = with_idempotency(&cache, &k, run).await.unwrap();
        let second = with_idempotency(&cache, &k, run).await.unwrap();

        assert_eq!(first, Payload(42));
        assert_eq!(second, Payload(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_duplicate_returns_in_progress() {
        let cache = FakeCache::default();
        let k = key();

        // Simulate a lock already held by another in-flight caller.
        cache.set_nx(&k.lock_key(), "1", LOCK_TTL).await.unwrap();

        let result = with_idempotency(&cache, &k, || async { Ok::<_, ServiceError>(Payload(1)) })
            .await;

        assert!(matches!(result, Err(ServiceError::InProgress)));
    }

    #[tokio::test]
    async fn failure_is_not_cached_and_releases_the_lock() {
        let cache = FakeCache::default();
        let k = key();

        let first = with_idempotency(&cache, &k, || async {
            Err::<Payload, _>(ServiceError::Validation("boom".into()))
        })
        .await;
        assert!(first.is_err());

        // The lock must have been released, so a retry can run fn again.
        let second = with_idempotency(&cache, &k, || async { Ok::<_, ServiceError>(Payload(7)) })
            .await
            .unwrap();
        assert_eq!(second, Payload(7));
    }
}
