use {crate::domain::error::ServiceError, async_trait::async_trait, std::time::Duration};

/// Cache/lock port (spec §4.2, §6 cache namespaces). An external
/// collaborator behind a minimal key-value + set-if-absent contract; the
/// idempotency engine and timeout scheduler depend only on this trait.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError>;

    /// Plain `SET key value EX ttl`, used for idempotency results and
    /// timeout records.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ServiceError>;

    /// Atomic set-if-absent with TTL — the single command the idempotency
    /// lock's acquire step depends on (spec §4.2 caveat: "must be atomic
    /// with lock placement").
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, ServiceError>;

    async fn exists(&self, key: &str) -> Result<bool, ServiceError>;

    async fn del(&self, key: &str) -> Result<(), ServiceError>;
}

/// Subscription to the cache's key-expiration notifications (spec §4.5
/// primary timeout path: `__keyevent@*__:expired`). Separate from `Cache`
/// because not every `Cache` implementation can offer it (the in-memory
/// test fake, for instance, has no pub/sub — it only backs the sweeper
/// path).
#[async_trait]
pub trait ExpirySubscriber: Send + Sync {
    /// Blocks until the next expired key arrives, returning its full key
    /// name (e.g. `payments:timeout:<uuid>`). Delivery is best-effort, per
    /// spec §4.5 — callers must not assume every expiry is observed here.
    async fn next_expired_key(&self) -> Result<Option<String>, ServiceError>;
}
