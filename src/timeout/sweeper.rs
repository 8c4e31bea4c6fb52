//! Safety-net sweeper (spec §4.5): a fixed-interval background task that
//! closes the gap left by best-effort cache expiry delivery.

use {
    crate::services::{context::ServiceContext, handle_timeout::handle_payment_timeout},
    std::{sync::Arc, time::Duration},
};

const INTERVAL: Duration = Duration::from_secs(60);
const BATCH_LIMIT: i64 = 50;

pub async fn run(ctx: Arc<ServiceContext>) {
    let mut ticker = tokio::time::interval(INTERVAL);
    loop {
        ticker.tick().await;
        if let Err(err) = sweep_once(&ctx).await {
            tracing::warn!(error = %err, "timeout sweeper batch query failed");
        }
    }
}

async fn sweep_once(ctx: &ServiceContext) -> Result<(), crate::domain::error::ServiceError> {
    let due = ctx.store.due_for_timeout(chrono::Utc::now(), BATCH_LIMIT).await?;
    for payment in due {
        if let Err(err) = handle_payment_timeout(ctx, payment.id).await {
            tracing::warn!(payment_id = %payment.id, error = %err, "failed to expire payment");
        }
    }
    Ok(())
}
