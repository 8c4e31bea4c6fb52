//! Consumes normalized provider events off `payment.provider-events.v1` and
//! dispatches them to `success_payment`/`failure_payment` (spec §4.5 step 4).
//! Dedup is checked twice — the cache's `processed:{provider}:{id}` key for
//! the hot path, the durable `processed_provider_events` table as the
//! backstop a cache flush can't defeat — but only written to *after* a
//! dispatch succeeds, so a transient failure can still be retried on the
//! next delivery.

use {
    crate::{
        domain::{error::ServiceError, events::ProviderEvent, id::ProviderOrderId, provider::Provider},
        ports::bus::{BusConsumer, BusMessage},
        services::{
            context::ServiceContext, failure_payment::failure_payment, success_payment::success_payment,
            topics,
        },
    },
    std::{sync::Arc, time::Duration},
};

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const POLL_BATCH: usize = 20;
const PROCESSED_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

pub async fn run(ctx: Arc<ServiceContext>, consumer: Arc<dyn BusConsumer>) {
    loop {
        match consumer.poll(topics::PROVIDER_EVENTS, POLL_BATCH).await {
            Ok(messages) if messages.is_empty() => {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            Ok(messages) => {
                for message in messages {
                    handle_message(&ctx, &consumer, message).await;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "provider-events poll failed, retrying");
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}

async fn handle_message(ctx: &ServiceContext, consumer: &Arc<dyn BusConsumer>, message: BusMessage) {
    if let Err(err) = process(ctx, &message).await {
        tracing::warn!(error = %err, delivery_tag = %message.delivery_tag, "provider event dispatch failed, leaving unacked for redelivery");
        return;
    }

    if let Err(err) = consumer.ack(&message.delivery_tag).await {
        tracing::warn!(error = %err, delivery_tag = %message.delivery_tag, "failed to ack provider event");
    }
}

async fn process(ctx: &ServiceContext, message: &BusMessage) -> Result<(), ServiceError> {
    let event: ProviderEvent = serde_json::from_value(message.payload.clone())?;

    if already_processed(ctx, &event).await? {
        tracing::debug!(provider_event_id = %event.provider_event_id, "duplicate provider event, skipping");
        return Ok(());
    }

    dispatch(ctx, &event).await?;
    mark_processed(ctx, &event).await
}

async fn already_processed(ctx: &ServiceContext, event: &ProviderEvent) -> Result<bool, ServiceError> {
    if ctx.cache.exists(&event.processed_key()).await? {
        return Ok(true);
    }
    ctx.processed_events
        .is_processed(event.provider.as_str(), &event.provider_event_id)
        .await
}

async fn mark_processed(ctx: &ServiceContext, event: &ProviderEvent) -> Result<(), ServiceError> {
    ctx.processed_events
        .mark_processed(event.provider.as_str(), &event.provider_event_id)
        .await?;
    ctx.cache
        .set(&event.processed_key(), "1", PROCESSED_TTL)
        .await
}

/// The `(provider, eventType)` dispatch table (spec §4.5 step 4). Event types
/// with no `provider_order_id` (spec §9 open question) or with no mapped
/// use case are acked without action.
async fn dispatch(ctx: &ServiceContext, event: &ProviderEvent) -> Result<(), ServiceError> {
    let Some(provider_order_id) = event.provider_order_id.as_deref() else {
        tracing::debug!(
            provider = %event.provider,
            event_type = %event.provider_event_type,
            "provider event carries no provider_order_id, skipping"
        );
        return Ok(());
    };
    let provider_order_id = ProviderOrderId::new(provider_order_id);

    match (event.provider, event.provider_event_type.as_str()) {
        (Provider::Stripe, "checkout.session.completed")
        | (Provider::Stripe, "payment_intent.succeeded")
        | (Provider::Razorpay, "payment.captured")
        | (Provider::Razorpay, "order.paid")
        | (Provider::Paypal, "PAYMENT.CAPTURE.COMPLETED") => {
            success_payment(ctx, event.provider, &provider_order_id).await
        }
        (Provider::Stripe, "payment_intent.payment_failed")
        | (Provider::Razorpay, "payment.failed")
        | (Provider::Paypal, "PAYMENT.CAPTURE.DENIED")
        | (Provider::Paypal, "PAYMENT.CAPTURE.FAILED") => {
            failure_payment(ctx, event.provider, &provider_order_id).await
        }
        _ => {
            tracing::debug!(
                provider = %event.provider,
                event_type = %event.provider_event_type,
                "no dispatch mapping for this event type, skipping"
            );
            Ok(())
        }
    }
}
