use {crate::domain::{audit::NewAuditEntry, error::ServiceError}, async_trait::async_trait};

/// Append-only audit trail port (spec §5 "every status change is recorded").
/// Kept separate from `PaymentStore` so use cases can record an audit entry
/// for requests that never create a `Payment` (signature failures, rejected
/// webhooks).
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn record(&self, entry: &NewAuditEntry) -> Result<(), ServiceError>;
}
