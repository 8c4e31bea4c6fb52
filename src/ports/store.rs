use {
    crate::domain::{
        error::ServiceError,
        id::{IdempotencyKey, PaymentId, ProviderOrderId},
        payment::Payment,
    },
    async_trait::async_trait,
    chrono::{DateTime, Utc},
};

/// Persistence port for the `Payment` aggregate (spec §6 `payments` /
/// `payment_provider_sessions` tables). An external collaborator: the core
/// depends only on this trait, never on a concrete database (spec §1).
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn find_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<Payment>, ServiceError>;

    async fn find_by_provider_order_id(
        &self,
        provider_order_id: &ProviderOrderId,
    ) -> Result<Option<Payment>, ServiceError>;

    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>, ServiceError>;

    /// Inserts a brand-new payment together with whatever sessions it
    /// already carries, in one transaction (spec §4.4 step 10, §5).
    async fn create(&self, payment: &Payment) -> Result<(), ServiceError>;

    /// Persists the aggregate's current status and the touched session(s)
    /// in one transaction, so no observer ever sees a mismatched pair
    /// (spec §5).
    async fn save(&self, payment: &Payment) -> Result<(), ServiceError>;

    /// Safety-net sweeper query (spec §4.5): `status = PENDING AND
    /// expiresAt <= now`, ordered by `expiresAt` ascending, capped at
    /// `limit`.
    async fn due_for_timeout(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Payment>, ServiceError>;
}
