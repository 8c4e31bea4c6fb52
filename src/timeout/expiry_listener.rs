//! Primary timeout path (spec §4.5): subscribes to the cache's
//! key-expiration notifications and dispatches `HandlePaymentTimeout` for
//! every `payments:timeout:*` key as it expires.

use {
    crate::{
        domain::id::PaymentId, ports::cache::ExpirySubscriber, services::context::ServiceContext,
        services::handle_timeout::handle_payment_timeout,
    },
    std::sync::Arc,
};

const TIMEOUT_KEY_PREFIX: &str = "payments:timeout:";

pub async fn run(ctx: Arc<ServiceContext>, subscriber: Arc<dyn ExpirySubscriber>) {
    loop {
        match subscriber.next_expired_key().await {
            Ok(Some(key)) => {
                if let Some(suffix) = key.strip_prefix(TIMEOUT_KEY_PREFIX) {
                    match suffix.parse::<uuid::Uuid>() {
                        Ok(uuid) => {
                            let payment_id = PaymentId::from_uuid(uuid);
                            if let Err(err) = handle_payment_timeout(&ctx, payment_id).await {
                                tracing::warn!(%payment_id, error = %err, "expiry-driven timeout handling failed");
                            }
                        }
                        Err(err) => {
                            tracing::warn!(key = %key, error = %err, "unparsable timeout key suffix");
                        }
                    }
                }
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, "expiry subscriber error, retrying");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }
}
