use {
    super::id::{PaymentId, ProviderOrderId},
    super::payment::PaymentStatus,
    super::provider::Provider,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// Every outbound envelope carries this shape (spec §6). `source` is fixed
/// to `"payment-service"` on every variant without exception (spec §9 open
/// question: the source omission asymmetry is not reproduced here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEnvelope<T> {
    pub event_id: Uuid,
    pub event_type: &'static str,
    pub source: &'static str,
    pub timestamp: i64,
    pub payload: T,
}

pub const SOURCE: &str = "payment-service";

impl<T> BusEnvelope<T> {
    pub fn wrap(event_type: &'static str, payload: T) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type,
            source: SOURCE,
            timestamp: Utc::now().timestamp_millis(),
            payload,
        }
    }
}

/// Topic `payment.order.initiated.v1` (spec §6), keyed by user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPaymentInitiated {
    pub payment_id: PaymentId,
    pub user_id: String,
    pub order_id: String,
    pub provider: Provider,
    pub provider_order_id: ProviderOrderId,
    pub payment_status: PaymentStatus,
}

/// Topic `payment.order.succeeded.v1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPaymentSucceeded {
    pub payment_id: PaymentId,
    pub user_id: String,
    pub order_id: String,
    pub provider: Provider,
    pub provider_order_id: ProviderOrderId,
}

/// Topic `payment.order.failed.v1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPaymentFailed {
    pub payment_id: PaymentId,
    pub user_id: String,
    pub order_id: String,
    pub provider: Provider,
    pub provider_order_id: Option<ProviderOrderId>,
    pub reason: Option<String>,
}

/// Topic `payment.order.timeout.v1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPaymentTimeout {
    pub payment_id: PaymentId,
    pub user_id: String,
    pub order_id: String,
}

/// Topic `payment.provider-events.v1`: the uniform shape every provider
/// webhook is normalized to before dispatch (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEvent {
    pub provider: Provider,
    pub provider_event_id: String,
    pub provider_event_type: String,
    /// The id `createSession` returned as `providerOrderId` — what locates
    /// the `Payment` aggregate. Not every allow-listed event type carries
    /// one (spec §9 open question); the consumer acks-and-skips those.
    pub provider_order_id: Option<String>,
    pub provider_payment_id: Option<String>,
    pub order_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub raw: serde_json::Value,
}

impl ProviderEvent {
    /// Cache key under the `processed:*` namespace (spec §3, §4.5).
    pub fn processed_key(&self) -> String {
        format!("processed:{}:{}", self.provider.as_str(), self.provider_event_id)
    }
}
