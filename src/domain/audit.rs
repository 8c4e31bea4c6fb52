use super::id::PaymentId;
use uuid::Uuid;

/// One row recording who did what to a `Payment`, and why. Recorded as a
/// follow-up call after the aggregate persists, for every status change.
pub struct NewAuditEntry {
    pub id: Uuid,
    pub payment_id: Option<PaymentId>,
    pub provider_order_id: Option<String>,
    pub actor: String,
    pub action: String,
    pub detail: serde_json::Value,
}

impl NewAuditEntry {
    pub fn new(
        payment_id: Option<PaymentId>,
        provider_order_id: Option<String>,
        actor: impl Into<String>,
        action: impl Into<String>,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            payment_id,
            provider_order_id,
            actor: actor.into(),
            action: action.into(),
            detail,
        }
    }
}
