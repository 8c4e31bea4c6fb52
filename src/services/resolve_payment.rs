//! `ResolvePayment` (spec §4.4). Client-driven confirmation path; the
//! authoritative success/failure still arrives via the webhook consumer.

use {
    crate::domain::{
        error::ServiceError,
        id::IdempotencyKey,
        payment::PaymentStatus,
        provider::{Provider, ProviderStatus, ResolveRequest},
    },
    crate::idempotency::with_idempotency,
    crate::infra::retry::with_retry,
    crate::services::context::ServiceContext,
    serde::{Deserialize, Serialize},
    std::time::Duration,
};

const RESOLVE_ATTEMPTS: u32 = 4;
const RESOLVE_DEADLINE: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvePaymentResult {
    pub provider_status: ProviderStatus,
    pub is_verified: bool,
    pub payment_id: crate::domain::id::PaymentId,
    pub order_id: String,
    pub provider: Provider,
}

pub async fn resolve_payment(
    ctx: &ServiceContext,
    idempotency_key: IdempotencyKey,
    request: ResolveRequest,
) -> Result<ResolvePaymentResult, ServiceError> {
    with_idempotency(ctx.cache.as_ref(), &idempotency_key, || execute(ctx, &request)).await
}

async fn execute(
    ctx: &ServiceContext,
    request: &ResolveRequest,
) -> Result<ResolvePaymentResult, ServiceError> {
    // Step 1-2: derive providerOrderId, load the payment.
    let provider_order_id = request.provider_order_id();
    let mut payment = ctx
        .store
        .find_by_provider_order_id(provider_order_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("payment for order {provider_order_id} not found")))?;

    let provider = match request {
        ResolveRequest::Stripe { .. } => Provider::Stripe,
        ResolveRequest::Paypal { .. } => Provider::Paypal,
        ResolveRequest::Razorpay { .. } => Provider::Razorpay,
    };
    let adapter = ctx.adapter(provider)?;

    // Step 3: call adapter resolve with bounded retry.
    let result = with_retry(RESOLVE_ATTEMPTS, RESOLVE_DEADLINE, || adapter.resolve(request)).await?;

    // Step 4: update the matching session.
    if let Some(session) = payment.find_session_mut(provider_order_id) {
        match result.provider_status {
            ProviderStatus::Captured => {
                session.mark_captured(result.provider_payment_id.as_ref().map(|id| id.as_str().to_string()))
            }
            ProviderStatus::Failed => session.mark_failed(),
            ProviderStatus::Pending => session.mark_approved(),
        }
    }

    // Step 5: advance PENDING -> RESOLVED; leave RESOLVED/terminal states alone.
    if payment.status == PaymentStatus::Pending {
        payment.transition_to(PaymentStatus::Resolved)?;
    }

    // Step 6: persist, no bus event here.
    ctx.store.save(&payment).await?;

    Ok(ResolvePaymentResult {
        provider_status: result.provider_status,
        is_verified: result.is_verified,
        payment_id: payment.id,
        order_id: payment.order_id,
        provider,
    })
}
