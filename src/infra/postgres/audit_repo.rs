use {
    crate::domain::{audit::NewAuditEntry, error::ServiceError},
    crate::ports::audit::AuditStore,
    async_trait::async_trait,
    sqlx::PgPool,
};

pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn record(&self, entry: &NewAuditEntry) -> Result<(), ServiceError> {
        sqlx::query!(
            r#"
            INSERT INTO audit_log (id, payment_id, provider_order_id, actor, action, detail)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
            entry.id,
            entry.payment_id.map(|id| id.as_uuid()),
            entry.provider_order_id,
            entry.actor,
            entry.action,
            entry.detail,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
