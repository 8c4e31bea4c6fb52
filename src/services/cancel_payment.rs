//! `CancelPayment` (spec §4.4).

use {
    crate::domain::{
        audit::NewAuditEntry,
        error::ServiceError,
        events::{BusEnvelope, OrderPaymentFailed},
        id::{IdempotencyKey, ProviderOrderId},
        payment::PaymentStatus,
        provider::Provider,
    },
    crate::idempotency::with_idempotency,
    crate::infra::retry::with_retry,
    crate::services::{context::ServiceContext, topics},
    serde::{Deserialize, Serialize},
    std::time::Duration,
};

const CANCEL_ATTEMPTS: u32 = 4;
const CANCEL_DEADLINE: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelPaymentRequest {
    pub provider: Provider,
    pub provider_order_id: ProviderOrderId,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelPaymentResult {
    pub success: bool,
}

pub async fn cancel_payment(
    ctx: &ServiceContext,
    idempotency_key: IdempotencyKey,
    request: CancelPaymentRequest,
) -> Result<CancelPaymentResult, ServiceError> {
    with_idempotency(ctx.cache.as_ref(), &idempotency_key, || execute(ctx, &request)).await
}

async fn execute(
    ctx: &ServiceContext,
    request: &CancelPaymentRequest,
) -> Result<CancelPaymentResult, ServiceError> {
    // Step 1: load, require PENDING.
    let mut payment = ctx
        .store
        .find_by_provider_order_id(&request.provider_order_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("payment for order {} not found", request.provider_order_id)))?;

    if payment.status != PaymentStatus::Pending {
        return Err(ServiceError::InvalidTransition(format!(
            "cannot cancel payment in status {}",
            payment.status
        )));
    }

    let adapter = ctx.adapter(request.provider)?;

    // Step 2: best-effort remote cancel with bounded retry.
    let cancel_result = with_retry(CANCEL_ATTEMPTS, CANCEL_DEADLINE, || {
        adapter.cancel(&request.provider_order_id, request.reason.as_deref())
    })
    .await?;

    if !cancel_result.success {
        return Err(ServiceError::ProviderCancelFailed(format!(
            "{} rejected cancellation of order {}",
            request.provider, request.provider_order_id
        )));
    }

    // Step 3: mark session FAILED, transition payment, persist.
    if let Some(session) = payment.find_session_mut(&request.provider_order_id) {
        session.mark_failed();
    }
    payment.transition_to(PaymentStatus::Cancelled)?;
    ctx.store.save(&payment).await?;

    ctx.audit
        .record(&NewAuditEntry::new(
            Some(payment.id),
            Some(request.provider_order_id.as_str().to_string()),
            "system",
            "payment.cancelled",
            serde_json::json!({ "reason": request.reason }),
        ))
        .await?;

    // Step 4: publish OrderPaymentFailed.
    let envelope = BusEnvelope::wrap(
        "OrderPaymentFailed",
        OrderPaymentFailed {
            payment_id: payment.id,
            user_id: payment.user_id.clone(),
            order_id: payment.order_id.clone(),
            provider: request.provider,
            provider_order_id: Some(request.provider_order_id.clone()),
            reason: request.reason.clone(),
        },
    );
    ctx.bus
        .publish(
            topics::ORDER_FAILED,
            &payment.user_id,
            serde_json::to_value(&envelope)?,
        )
        .await?;

    Ok(CancelPaymentResult { success: true })
}
