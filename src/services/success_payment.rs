//! `SuccessPayment` (spec §4.4), invoked by the webhook consumer. Not
//! wrapped by the idempotency engine in the request-header sense — its
//! idempotency key is the immutable provider event id, enforced upstream by
//! the `processed:*` cache check (spec §4.5 step 2).

use {
    crate::domain::{
        audit::NewAuditEntry,
        error::ServiceError,
        events::{BusEnvelope, OrderPaymentSucceeded},
        id::ProviderOrderId,
        payment::PaymentStatus,
        provider::Provider,
    },
    crate::services::{context::ServiceContext, topics},
};

pub async fn success_payment(
    ctx: &ServiceContext,
    provider: Provider,
    provider_order_id: &ProviderOrderId,
) -> Result<(), ServiceError> {
    let mut payment = ctx
        .store
        .find_by_provider_order_id(provider_order_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("payment for order {provider_order_id} not found")))?;

    // Step 2: idempotent no-op if already SUCCESS.
    if payment.status == PaymentStatus::Success {
        return Ok(());
    }

    // Step 3: anything other than PENDING/RESOLVED is a forbidden edge.
    if !matches!(payment.status, PaymentStatus::Pending | PaymentStatus::Resolved) {
        return Err(ServiceError::InvalidTransition(format!(
            "cannot mark payment {} successful from status {}",
            payment.id, payment.status
        )));
    }

    // Step 4: transition, update session, persist.
    payment.transition_to(PaymentStatus::Success)?;
    if let Some(session) = payment.find_session_mut(provider_order_id) {
        session.mark_captured(None);
    }
    ctx.store.save(&payment).await?;

    ctx.audit
        .record(&NewAuditEntry::new(
            Some(payment.id),
            Some(provider_order_id.as_str().to_string()),
            "webhook",
            "payment.succeeded",
            serde_json::json!({ "provider": provider }),
        ))
        .await?;

    // Step 5: publish OrderPaymentSucceeded.
    let envelope = BusEnvelope::wrap(
        "OrderPaymentSucceeded",
        OrderPaymentSucceeded {
            payment_id: payment.id,
            user_id: payment.user_id.clone(),
            order_id: payment.order_id.clone(),
            provider,
            provider_order_id: provider_order_id.clone(),
        },
    );
    ctx.bus
        .publish(
            topics::ORDER_SUCCEEDED,
            &payment.user_id,
            serde_json::to_value(&envelope)?,
        )
        .await?;

    Ok(())
}
