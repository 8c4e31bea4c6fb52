use {crate::domain::error::ServiceError, async_trait::async_trait};

/// Producer side of the message bus port (spec §6). Every publish happens
/// before the triggering RPC/webhook response is returned (spec §5: "not
/// an internal buffer"). Callers serialize their envelope to JSON before
/// calling `publish` — keeping the trait free of a generic method keeps it
/// object-safe, so it can be held as `Arc<dyn BusProducer>`.
#[async_trait]
pub trait BusProducer: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<(), ServiceError>;
}

/// One delivered message, as the consumer side sees it.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: String,
    pub key: String,
    pub payload: serde_json::Value,
    /// Opaque handle the consumer passes back to `ack` once processing
    /// completes without raising (spec §4.5 step 4).
    pub delivery_tag: String,
}

/// Consumer side of the message bus port, subscribed to
/// `payment.provider-events.v1` with a consumer group isolated to this
/// service (spec §6).
#[async_trait]
pub trait BusConsumer: Send + Sync {
    async fn poll(&self, topic: &str, max: usize) -> Result<Vec<BusMessage>, ServiceError>;

    async fn ack(&self, delivery_tag: &str) -> Result<(), ServiceError>;
}
