//! `BusProducer`/`BusConsumer` over Redis Streams (spec §6 message bus).
//! Redis Streams give an append-only log plus consumer groups, which maps
//! directly onto the port's publish/poll/ack shape without introducing a
//! second broker dependency beyond the `redis` crate the cache already uses.

use {
    crate::domain::error::ServiceError,
    crate::ports::bus::{BusConsumer, BusMessage, BusProducer},
    async_trait::async_trait,
    redis::{AsyncCommands, aio::ConnectionManager, streams::StreamReadOptions},
    std::time::Duration,
};

const CONSUMER_GROUP: &str = "payment-service";
/// Entries claimed by a consumer but left unacked this long are assumed
/// abandoned (consumer crashed mid-dispatch) and are reclaimed for
/// redelivery.
const STALE_IDLE: Duration = Duration::from_secs(120);

pub struct RedisBus {
    conn: ConnectionManager,
    consumer_name: String,
}

impl RedisBus {
    pub async fn connect(redis_url: &str, consumer_name: impl Into<String>) -> Result<Self, ServiceError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| ServiceError::Cache(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| ServiceError::Cache(format!("redis connect: {e}")))?;
        Ok(Self {
            conn,
            consumer_name: consumer_name.into(),
        })
    }

    /// Ensures the consumer group exists; tolerant of `BUSYGROUP` when it
    /// already does.
    pub async fn ensure_group(&self, topic: &str) -> Result<(), ServiceError> {
        let result: redis::RedisResult<()> = self
            .conn
            .clone()
            .xgroup_create_mkstream(topic, CONSUMER_GROUP, "0")
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(ServiceError::Cache(format!("xgroup create {topic}: {e}"))),
        }
    }

    /// Claims pending entries idle for longer than [`STALE_IDLE`] back onto
    /// this consumer, so a crashed consumer's in-flight deliveries are
    /// eventually retried rather than stuck forever in the group's pending
    /// entries list. Returns the number of entries reclaimed.
    pub async fn reclaim_stale(&self, topic: &str) -> Result<u64, ServiceError> {
        let reply: redis::Value = redis::cmd("XAUTOCLAIM")
            .arg(topic)
            .arg(CONSUMER_GROUP)
            .arg(&self.consumer_name)
            .arg(STALE_IDLE.as_millis() as i64)
            .arg("0-0")
            .arg("COUNT")
            .arg(50)
            .query_async(&mut self.conn.clone())
            .await
            .map_err(|e| ServiceError::Cache(format!("XAUTOCLAIM {topic}: {e}")))?;

        // Reply shape: [next-cursor, [[id, [field, val, ...]], ...], [deleted-ids]].
        let claimed = match reply {
            redis::Value::Array(items) => match items.get(1) {
                Some(redis::Value::Array(entries)) => entries.len() as u64,
                _ => 0,
            },
            _ => 0,
        };
        Ok(claimed)
    }
}

const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Background task pairing with [`RedisBus::reclaim_stale`]: periodically
/// sweeps `topic`'s pending entries list so a crashed consumer never wedges
/// a provider event forever.
pub async fn run_reaper(bus: std::sync::Arc<RedisBus>, topic: &'static str) {
    let mut ticker = tokio::time::interval(REAP_INTERVAL);
    loop {
        ticker.tick().await;
        match bus.reclaim_stale(topic).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(topic, reclaimed = n, "reclaimed stale pending entries"),
            Err(err) => tracing::warn!(topic, error = %err, "stale-entry reclaim failed"),
        }
    }
}

#[async_trait]
impl BusProducer for RedisBus {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<(), ServiceError> {
        let body = serde_json::to_string(&payload)?;
        self.conn
            .clone()
            .xadd::<_, _, _, _, ()>(topic, "*", &[("key", key), ("payload", body.as_str())])
            .await
            .map_err(|e| ServiceError::Cache(format!("XADD {topic}: {e}")))
    }
}

#[async_trait]
impl BusConsumer for RedisBus {
    async fn poll(&self, topic: &str, max: usize) -> Result<Vec<BusMessage>, ServiceError> {
        let opts = StreamReadOptions::default()
            .group(CONSUMER_GROUP, &self.consumer_name)
            .count(max);

        let reply: redis::streams::StreamReadReply = self
            .conn
            .clone()
            .xread_options(&[topic], &[">"], &opts)
            .await
            .map_err(|e| ServiceError::Cache(format!("XREADGROUP {topic}: {e}")))?;

        let mut messages = Vec::new();
        for stream_key in reply.keys {
            for entry in stream_key.ids {
                let key: String = entry
                    .map
                    .get("key")
                    .and_then(|v| redis::from_redis_value::<String>(v).ok())
                    .unwrap_or_default();
                let payload_raw: String = entry
                    .map
                    .get("payload")
                    .and_then(|v| redis::from_redis_value::<String>(v).ok())
                    .unwrap_or_default();
                let payload = serde_json::from_str(&payload_raw).unwrap_or(serde_json::Value::Null);

                messages.push(BusMessage {
                    topic: stream_key.key.clone(),
                    key,
                    payload,
                    delivery_tag: format!("{}:{}", stream_key.key, entry.id),
                });
            }
        }
        Ok(messages)
    }

    async fn ack(&self, delivery_tag: &str) -> Result<(), ServiceError> {
        // The topic isn't threaded through the port's `ack` signature, so the
        // delivery tag is namespaced as `topic:id` by convention at the
        // producer/consumer boundary below.
        let (topic, id) = delivery_tag
            .split_once(':')
            .ok_or_else(|| ServiceError::Cache(format!("malformed delivery tag: {delivery_tag}")))?;

        self.conn
            .clone()
            .xack::<_, _, _, ()>(topic, CONSUMER_GROUP, &[id])
            .await
            .map_err(|e| ServiceError::Cache(format!("XACK {topic}: {e}")))
    }
}
