//! Durable backstop for webhook dedup. The cache's
//! `processed:{provider}:{id}` key is the hot path; this table survives a
//! cache flush.

use {crate::domain::error::ServiceError, sqlx::PgPool};

pub struct PgProcessedEventsRepo {
    pool: PgPool,
}

impl PgProcessedEventsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn is_processed(
        &self,
        provider: &str,
        provider_event_id: &str,
    ) -> Result<bool, ServiceError> {
        let row = sqlx::query_scalar!(
            r#"SELECT EXISTS(
                SELECT 1 FROM processed_provider_events
                WHERE provider = $1 AND provider_event_id = $2
            ) AS "exists!""#,
            provider,
            provider_event_id,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Returns `true` if this is the first time this event has been seen.
    pub async fn mark_processed(
        &self,
        provider: &str,
        provider_event_id: &str,
    ) -> Result<bool, ServiceError> {
        let result = sqlx::query!(
            r#"
            INSERT INTO processed_provider_events (provider, provider_event_id)
            VALUES ($1, $2)
            ON CONFLICT (provider, provider_event_id) DO NOTHING
            "#,
            provider,
            provider_event_id,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
