//! `FailurePayment` (spec §4.4), invoked by the webhook consumer.

use {
    crate::domain::{
        audit::NewAuditEntry,
        error::ServiceError,
        events::{BusEnvelope, OrderPaymentFailed},
        id::ProviderOrderId,
        payment::PaymentStatus,
        provider::Provider,
    },
    crate::services::{context::ServiceContext, topics},
};

pub async fn failure_payment(
    ctx: &ServiceContext,
    provider: Provider,
    provider_order_id: &ProviderOrderId,
) -> Result<(), ServiceError> {
    let mut payment = ctx
        .store
        .find_by_provider_order_id(provider_order_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("payment for order {provider_order_id} not found")))?;

    // Step 1: idempotent no-op if already FAILED.
    if payment.status == PaymentStatus::Failed {
        return Ok(());
    }
    if payment.status != PaymentStatus::Pending {
        return Err(ServiceError::InvalidTransition(format!(
            "cannot fail payment {} from status {}",
            payment.id, payment.status
        )));
    }

    // Step 2: transition, update session, persist, publish.
    payment.transition_to(PaymentStatus::Failed)?;
    if let Some(session) = payment.find_session_mut(provider_order_id) {
        session.mark_failed();
    }
    ctx.store.save(&payment).await?;

    ctx.audit
        .record(&NewAuditEntry::new(
            Some(payment.id),
            Some(provider_order_id.as_str().to_string()),
            "webhook",
            "payment.failed",
            serde_json::json!({ "provider": provider }),
        ))
        .await?;

    let envelope = BusEnvelope::wrap(
        "OrderPaymentFailed",
        OrderPaymentFailed {
            payment_id: payment.id,
            user_id: payment.user_id.clone(),
            order_id: payment.order_id.clone(),
            provider,
            provider_order_id: Some(provider_order_id.clone()),
            reason: Some("provider reported failure".to_string()),
        },
    );
    ctx.bus
        .publish(
            topics::ORDER_FAILED,
            &payment.user_id,
            serde_json::to_value(&envelope)?,
        )
        .await?;

    Ok(())
}
