//! `ExpirySubscriber` over Redis keyspace notifications, the primary timeout
//! path. Requires the server to have `notify-keyspace-events Ex` set; if it
//! doesn't, subscription succeeds but no events ever arrive and the sweeper
//! remains the only path — an intentional best-effort degrade.

use {
    crate::domain::error::ServiceError, async_trait::async_trait, futures_util::StreamExt,
    redis::aio::PubSub,
};

use crate::ports::cache::ExpirySubscriber;

pub struct RedisExpirySubscriber {
    pubsub: tokio::sync::Mutex<PubSub>,
}

impl RedisExpirySubscriber {
    pub async fn connect(redis_url: &str, db_index: u8) -> Result<Self, ServiceError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| ServiceError::Cache(format!("invalid redis url: {e}")))?;
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| ServiceError::Cache(format!("redis pubsub connect: {e}")))?;

        pubsub
            .psubscribe(format!("__keyevent@{db_index}__:expired"))
            .await
            .map_err(|e| ServiceError::Cache(format!("redis psubscribe: {e}")))?;

        Ok(Self {
            pubsub: tokio::sync::Mutex::new(pubsub),
        })
    }
}

#[async_trait]
impl ExpirySubscriber for RedisExpirySubscriber {
    async fn next_expired_key(&self) -> Result<Option<String>, ServiceError> {
        let mut pubsub = self.pubsub.lock().await;
        match pubsub.on_message().next().await {
            Some(msg) => {
                let key: String = msg
                    .get_payload()
                    .map_err(|e| ServiceError::Cache(format!("redis expiry payload: {e}")))?;
                Ok(Some(key))
            }
            None => Ok(None),
        }
    }
}
