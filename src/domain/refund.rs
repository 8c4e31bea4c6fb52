use {
    super::id::{PaymentId, ProviderSessionId},
    super::money::Money,
    super::provider::RefundStatus,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// One-to-one with a `CAPTURED` `ProviderSession` (spec §3). Referenced,
/// not fully specified: the refund write path (authorization policy) is
/// explicitly out of scope (spec §1 Non-goals); only this record shape is
/// carried, because the lifecycle model needs to know "is this session
/// refundable" without knowing how a refund gets authorized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRefund {
    pub id: Uuid,
    pub payment_id: PaymentId,
    pub provider_session_id: ProviderSessionId,
    pub provider_refund_id: Option<String>,
    pub requested: Money,
    pub idempotency_key: Uuid,
    pub provider_fee: Option<Money>,
    pub status: RefundStatus,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProviderRefund {
    pub fn new(
        payment_id: PaymentId,
        provider_session_id: ProviderSessionId,
        requested: Money,
        idempotency_key: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            payment_id,
            provider_session_id,
            provider_refund_id: None,
            requested,
            idempotency_key,
            provider_fee: None,
            status: RefundStatus::Pending,
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }
}
