pub mod audit_repo;
pub mod payment_repo;
pub mod processed_events_repo;

pub use audit_repo::PgAuditStore;
pub use payment_repo::PgPaymentStore;
pub use processed_events_repo::PgProcessedEventsRepo;
