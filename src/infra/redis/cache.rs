//! `Cache` over Redis, via `redis`'s async connection manager (reconnects
//! transparently on dropped connections, which is why the pack reaches for
//! it over a bare `MultiplexedConnection`).

use {
    crate::domain::error::ServiceError,
    async_trait::async_trait,
    redis::{AsyncCommands, aio::ConnectionManager},
    std::time::Duration,
};

use crate::ports::cache::Cache;

pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self, ServiceError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| ServiceError::Cache(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| ServiceError::Cache(format!("redis connect: {e}")))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        self.conn
            .clone()
            .get(key)
            .await
            .map_err(|e| ServiceError::Cache(format!("GET {key}: {e}")))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ServiceError> {
        self.conn
            .clone()
            .set_ex::<_, _, ()>(key, value, ttl.as_secs())
            .await
            .map_err(|e| ServiceError::Cache(format!("SET {key}: {e}")))
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, ServiceError> {
        // SET key value NX EX ttl — atomic, per spec §4.2's lock-placement caveat.
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut self.conn.clone())
            .await
            .map_err(|e| ServiceError::Cache(format!("SET NX {key}: {e}")))?;

        Ok(result.is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, ServiceError> {
        self.conn
            .clone()
            .exists(key)
            .await
            .map_err(|e| ServiceError::Cache(format!("EXISTS {key}: {e}")))
    }

    async fn del(&self, key: &str) -> Result<(), ServiceError> {
        self.conn
            .clone()
            .del::<_, ()>(key)
            .await
            .map_err(|e| ServiceError::Cache(format!("DEL {key}: {e}")))
    }
}
