//! `PaymentStore` over Postgres (`payments` / `payment_provider_sessions`).
//! Uses manual row-to-domain construction rather than deriving `FromRow`
//! directly onto domain types, since the domain types carry newtypes and
//! enums sqlx doesn't know how to decode natively.

use {
    crate::domain::{
        error::ServiceError,
        id::{IdempotencyKey, PaymentId, ProviderOrderId, ProviderSessionId},
        money::{Currency, Money, MoneyAmount},
        payment::{Payment, ProviderSession, ProviderSessionStatus},
        provider::Provider,
    },
    crate::ports::store::PaymentStore,
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    sqlx::PgPool,
};

pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

struct PaymentRow {
    id: uuid::Uuid,
    user_id: String,
    order_id: String,
    original_amount: i64,
    original_currency: String,
    idempotency_key: uuid::Uuid,
    status: String,
    provider_order_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

struct SessionRow {
    id: uuid::Uuid,
    payment_id: uuid::Uuid,
    provider: String,
    provider_order_id: String,
    provider_payment_id: Option<String>,
    amount: i64,
    currency: String,
    fx_rate: Option<rust_decimal::Decimal>,
    fx_timestamp: Option<DateTime<Utc>>,
    status: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn row_to_session(row: SessionRow) -> Result<ProviderSession, ServiceError> {
    Ok(ProviderSession {
        id: ProviderSessionId::from_uuid(row.id),
        payment_id: PaymentId::from_uuid(row.payment_id),
        provider: Provider::try_from(row.provider.as_str())?,
        provider_order_id: ProviderOrderId::new(row.provider_order_id),
        provider_payment_id: row.provider_payment_id,
        amount: Money::new(
            MoneyAmount::new(row.amount)?,
            Currency::try_from(row.currency.as_str())?,
        ),
        fx_rate: row.fx_rate,
        fx_timestamp: row.fx_timestamp,
        status: ProviderSessionStatus::try_from(row.status.as_str())?,
        metadata: row.metadata,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn row_to_payment(row: PaymentRow, sessions: Vec<ProviderSession>) -> Result<Payment, ServiceError> {
    Ok(Payment {
        id: PaymentId::from_uuid(row.id),
        user_id: row.user_id,
        order_id: row.order_id,
        original_amount: Money::new(
            MoneyAmount::new(row.original_amount)?,
            Currency::try_from(row.original_currency.as_str())?,
        ),
        idempotency_key: IdempotencyKey::new(row.idempotency_key),
        status: row.status.as_str().try_into()?,
        provider_order_id: row.provider_order_id.map(ProviderOrderId::new),
        created_at: row.created_at,
        updated_at: row.updated_at,
        expires_at: row.expires_at,
        sessions,
    })
}

impl PgPaymentStore {
    async fn sessions_for(
        &self,
        executor: impl sqlx::PgExecutor<'_>,
        payment_id: uuid::Uuid,
    ) -> Result<Vec<ProviderSession>, ServiceError> {
        let rows = sqlx::query_as!(
            SessionRow,
            r#"
            SELECT id, payment_id, provider, provider_order_id, provider_payment_id,
                   amount, currency, fx_rate, fx_timestamp, status, metadata,
                   created_at, updated_at
            FROM payment_provider_sessions
            WHERE payment_id = $1
            ORDER BY created_at ASC
            "#,
            payment_id,
        )
        .fetch_all(executor)
        .await?;

        rows.into_iter().map(row_to_session).collect()
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn find_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<Payment>, ServiceError> {
        let row = sqlx::query_as!(
            PaymentRow,
            r#"
            SELECT id, user_id, order_id, original_amount, original_currency,
                   idempotency_key, status, provider_order_id, created_at, updated_at, expires_at
            FROM payments WHERE idempotency_key = $1
            "#,
            key.as_uuid(),
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some(row) => {
                let sessions = self.sessions_for(&self.pool, row.id).await?;
                Ok(Some(row_to_payment(row, sessions)?))
            }
        }
    }

    async fn find_by_provider_order_id(
        &self,
        provider_order_id: &ProviderOrderId,
    ) -> Result<Option<Payment>, ServiceError> {
        let row = sqlx::query_as!(
            PaymentRow,
            r#"
            SELECT id, user_id, order_id, original_amount, original_currency,
                   idempotency_key, status, provider_order_id, created_at, updated_at, expires_at
            FROM payments WHERE provider_order_id = $1
            "#,
            provider_order_id.as_str(),
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some(row) => {
                let sessions = self.sessions_for(&self.pool, row.id).await?;
                Ok(Some(row_to_payment(row, sessions)?))
            }
        }
    }

    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>, ServiceError> {
        let row = sqlx::query_as!(
            PaymentRow,
            r#"
            SELECT id, user_id, order_id, original_amount, original_currency,
                   idempotency_key, status, provider_order_id, created_at, updated_at, expires_at
            FROM payments WHERE id = $1
            "#,
            id.as_uuid(),
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some(row) => {
                let sessions = self.sessions_for(&self.pool, row.id).await?;
                Ok(Some(row_to_payment(row, sessions)?))
            }
        }
    }

    async fn create(&self, payment: &Payment) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query!(
            r#"
            INSERT INTO payments
                (id, user_id, order_id, original_amount, original_currency,
                 idempotency_key, status, provider_order_id, created_at, updated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
            payment.id.as_uuid(),
            payment.user_id,
            payment.order_id,
            payment.original_amount.amount().minor_units(),
            payment.original_amount.currency().as_str(),
            payment.idempotency_key.as_uuid(),
            payment.status.as_str(),
            payment.provider_order_id.as_ref().map(|p| p.as_str()),
            payment.created_at,
            payment.updated_at,
            payment.expires_at,
        )
        .execute(&mut *tx)
        .await?;

        for session in &payment.sessions {
            insert_session(&mut tx, payment.id.as_uuid(), session).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn save(&self, payment: &Payment) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query!(
            r#"
            UPDATE payments
            SET status = $1, provider_order_id = $2, updated_at = $3
            WHERE id = $4
            "#,
            payment.status.as_str(),
            payment.provider_order_id.as_ref().map(|p| p.as_str()),
            payment.updated_at,
            payment.id.as_uuid(),
        )
        .execute(&mut *tx)
        .await?;

        for session in &payment.sessions {
            upsert_session(&mut tx, payment.id.as_uuid(), session).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn due_for_timeout(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Payment>, ServiceError> {
        let rows = sqlx::query_as!(
            PaymentRow,
            r#"
            SELECT id, user_id, order_id, original_amount, original_currency,
                   idempotency_key, status, provider_order_id, created_at, updated_at, expires_at
            FROM payments
            WHERE status = 'pending' AND expires_at <= $1
            ORDER BY expires_at ASC
            LIMIT $2
            "#,
            now,
            limit,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut payments = Vec::with_capacity(rows.len());
        for row in rows {
            let sessions = self.sessions_for(&self.pool, row.id).await?;
            payments.push(row_to_payment(row, sessions)?);
        }
        Ok(payments)
    }
}

async fn insert_session(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    payment_id: uuid::Uuid,
    session: &ProviderSession,
) -> Result<(), ServiceError> {
    sqlx::query!(
        r#"
        INSERT INTO payment_provider_sessions
            (id, payment_id, provider, provider_order_id, provider_payment_id,
             amount, currency, fx_rate, fx_timestamp, status, metadata, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
        session.id.as_uuid(),
        payment_id,
        session.provider.as_str(),
        session.provider_order_id.as_str(),
        session.provider_payment_id,
        session.amount.amount().minor_units(),
        session.amount.currency().as_str(),
        session.fx_rate,
        session.fx_timestamp,
        session.status.as_str(),
        session.metadata,
        session.created_at,
        session.updated_at,
    )
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// `save` re-writes whichever sessions changed. New sessions (no matching
/// row yet) and updates both funnel through the unique
/// `(provider, provider_order_id)` constraint.
async fn upsert_session(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    payment_id: uuid::Uuid,
    session: &ProviderSession,
) -> Result<(), ServiceError> {
    sqlx::query!(
        r#"
        INSERT INTO payment_provider_sessions
            (id, payment_id, provider, provider_order_id, provider_payment_id,
             amount, currency, fx_rate, fx_timestamp, status, metadata, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (provider, provider_order_id) DO UPDATE SET
            provider_payment_id = EXCLUDED.provider_payment_id,
            status = EXCLUDED.status,
            metadata = EXCLUDED.metadata,
            updated_at = EXCLUDED.updated_at
        "#,
        session.id.as_uuid(),
        payment_id,
        session.provider.as_str(),
        session.provider_order_id.as_str(),
        session.provider_payment_id,
        session.amount.amount().minor_units(),
        session.amount.currency().as_str(),
        session.fx_rate,
        session.fx_timestamp,
        session.status.as_str(),
        session.metadata,
        session.created_at,
        session.updated_at,
    )
    .execute(&mut **tx)
    .await?;
    Ok(())
}
