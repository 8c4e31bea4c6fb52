//! `HandlePaymentTimeout` (spec §4.4), invoked by both the primary
//! key-expiration listener and the safety-net sweeper (spec §4.5). Idempotent
//! by construction: it no-ops on any non-`PENDING` payment.

use {
    crate::domain::{
        error::ServiceError,
        events::{BusEnvelope, OrderPaymentTimeout},
        id::PaymentId,
        payment::PaymentStatus,
    },
    crate::services::{context::ServiceContext, topics},
};

pub async fn handle_payment_timeout(ctx: &ServiceContext, payment_id: PaymentId) -> Result<(), ServiceError> {
    let mut payment = match ctx.store.find_by_id(payment_id).await? {
        Some(p) => p,
        None => return Ok(()),
    };

    // Step 1: no-op unless still PENDING.
    if payment.status != PaymentStatus::Pending {
        return Ok(());
    }

    // Step 2: transition, persist.
    payment.transition_to(PaymentStatus::Expired)?;
    ctx.store.save(&payment).await?;

    // Step 3: publish OrderPaymentTimeout.
    let envelope = BusEnvelope::wrap(
        "OrderPaymentTimeout",
        OrderPaymentTimeout {
            payment_id: payment.id,
            user_id: payment.user_id.clone(),
            order_id: payment.order_id.clone(),
        },
    );
    ctx.bus
        .publish(
            topics::ORDER_TIMEOUT,
            &payment.user_id,
            serde_json::to_value(&envelope)?,
        )
        .await?;

    Ok(())
}
