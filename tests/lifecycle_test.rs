mod common;

use common::*;
use payment_orchestrator::{
    domain::{
        error::ServiceError,
        id::{ProviderOrderId, ProviderPaymentId},
        payment::{PaymentStatus, ProviderSessionStatus},
        provider::{Provider, ProviderStatus, ResolveRequest},
    },
    services::{
        cancel_payment::{cancel_payment, CancelPaymentRequest},
        create_payment::{create_payment, CreatePaymentRequest},
        failure_payment::failure_payment,
        handle_timeout::handle_payment_timeout,
        resolve_payment::resolve_payment,
        success_payment::success_payment,
        topics,
    },
};
use std::sync::Arc;

struct Fixture {
    ctx: payment_orchestrator::services::context::ServiceContext,
    store: Arc<FakeStore>,
    bus: Arc<FakeBus>,
    adapter: Arc<FakeAdapter>,
}

async fn created_payment(provider: Provider) -> (Fixture, ProviderOrderId) {
    let store = Arc::new(FakeStore::default());
    let cache = Arc::new(FakeCache::default());
    let bus = Arc::new(FakeBus::default());
    let order = FakeOrder::payable("order-1", 5000, "USD");
    let adapter = Arc::new(FakeAdapter::new(provider));
    let providers = single_provider(provider, adapter.clone());

    let ctx = build_context(store.clone(), cache, bus.clone(), order, providers);
    let key = random_idempotency_key();
    let request = CreatePaymentRequest {
        user_id: "user-1".into(),
        order_id: "order-1".into(),
        provider,
        success_url: None,
        cancel_url: None,
    };
    let result = create_payment(&ctx, key, request).await.unwrap();
    let provider_order_id = result.provider_order_id;

    (Fixture { ctx, store, bus, adapter }, provider_order_id)
}

fn resolve_request(provider: Provider, provider_order_id: ProviderOrderId) -> ResolveRequest {
    match provider {
        Provider::Stripe => ResolveRequest::Stripe { provider_order_id },
        Provider::Paypal => ResolveRequest::Paypal { provider_order_id },
        Provider::Razorpay => ResolveRequest::Razorpay {
            provider_order_id,
            provider_payment_id: ProviderPaymentId::new("pay_test"),
            signature: "deadbeef".into(),
        },
    }
}

// spec §8 scenario 3 (webhook-side): resolve drives PENDING -> RESOLVED,
// matching session moves to CAPTURED.
#[tokio::test]
async fn resolve_moves_pending_to_resolved_and_captures_session() {
    let (fx, provider_order_id) = created_payment(Provider::Razorpay).await;

    let result = resolve_payment(
        &fx.ctx,
        random_idempotency_key(),
        resolve_request(Provider::Razorpay, provider_order_id.clone()),
    )
    .await
    .unwrap();

    assert!(result.is_verified);
    assert_eq!(result.provider_status, ProviderStatus::Captured);

    let payment = fx.store.find_by_provider_order_id(&provider_order_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Resolved);
    assert_eq!(payment.sessions[0].status, ProviderSessionStatus::Captured);
    assert_eq!(fx.bus.messages().len(), 1, "resolve itself publishes no bus event");
}

// spec §8 scenario 3 continued + round-trip law: resolve then webhook
// success yields the same terminal state as success arriving directly.
#[tokio::test]
async fn resolve_then_webhook_success_reaches_success_exactly_once() {
    let (fx, provider_order_id) = created_payment(Provider::Razorpay).await;

    resolve_payment(
        &fx.ctx,
        random_idempotency_key(),
        resolve_request(Provider::Razorpay, provider_order_id.clone()),
    )
    .await
    .unwrap();

    success_payment(&fx.ctx, Provider::Razorpay, &provider_order_id).await.unwrap();

    let payment = fx.store.find_by_provider_order_id(&provider_order_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Success);
    assert_eq!(fx.bus.count_on(topics::ORDER_SUCCEEDED), 1);

    // A second success is idempotent: no-op, no duplicate event.
    success_payment(&fx.ctx, Provider::Razorpay, &provider_order_id).await.unwrap();
    assert_eq!(fx.bus.count_on(topics::ORDER_SUCCEEDED), 1, "no duplicate publish");
}

// The other ordering: webhook success arrives before any resolve RPC.
#[tokio::test]
async fn webhook_success_before_resolve_reaches_the_same_terminal_state() {
    let (fx, provider_order_id) = created_payment(Provider::Stripe).await;

    success_payment(&fx.ctx, Provider::Stripe, &provider_order_id).await.unwrap();

    let payment = fx.store.find_by_provider_order_id(&provider_order_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Success);
    assert_eq!(payment.sessions[0].status, ProviderSessionStatus::Captured);
    assert_eq!(fx.bus.count_on(topics::ORDER_SUCCEEDED), 1);
}

// spec §8 scenario 4: cancel before resolve.
#[tokio::test]
async fn cancel_before_resolve_marks_cancelled_and_rejects_late_success() {
    let (fx, provider_order_id) = created_payment(Provider::Paypal).await;

    let result = cancel_payment(
        &fx.ctx,
        random_idempotency_key(),
        CancelPaymentRequest {
            provider: Provider::Paypal,
            provider_order_id: provider_order_id.clone(),
            reason: Some("user changed their mind".into()),
        },
    )
    .await
    .unwrap();
    assert!(result.success);

    let payment = fx.store.find_by_provider_order_id(&provider_order_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Cancelled);
    assert_eq!(payment.sessions[0].status, ProviderSessionStatus::Failed);
    assert_eq!(fx.bus.count_on(topics::ORDER_FAILED), 1);

    // A late webhook success must not resurrect a cancelled payment.
    let err = success_payment(&fx.ctx, Provider::Paypal, &provider_order_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)));
    assert_eq!(fx.bus.count_on(topics::ORDER_SUCCEEDED), 0, "rejected success publishes nothing");
}

#[tokio::test]
async fn cancel_requires_pending_status() {
    let (fx, provider_order_id) = created_payment(Provider::Stripe).await;
    success_payment(&fx.ctx, Provider::Stripe, &provider_order_id).await.unwrap();

    let err = cancel_payment(
        &fx.ctx,
        random_idempotency_key(),
        CancelPaymentRequest {
            provider: Provider::Stripe,
            provider_order_id,
            reason: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)));
}

#[tokio::test]
async fn provider_cancel_failure_surfaces_as_provider_cancel_failed() {
    let (fx, provider_order_id) = created_payment(Provider::Stripe).await;
    fx.adapter.set_cancel_success(false);

    let err = cancel_payment(
        &fx.ctx,
        random_idempotency_key(),
        CancelPaymentRequest {
            provider: Provider::Stripe,
            provider_order_id,
            reason: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::ProviderCancelFailed(_)));
}

// spec §8 scenario 5: timeout via the sweeper. Modeled here by driving
// `handle_payment_timeout` directly (the sweeper itself is a thin poll
// loop around the same call, tested by `timeout_sweeper_is_idempotent`
// in this file standing in for two consecutive sweeper ticks).
#[tokio::test]
async fn handle_timeout_expires_a_pending_payment_and_publishes_once() {
    let (fx, _provider_order_id) = created_payment(Provider::Stripe).await;
    let payment = fx.store.find_by_provider_order_id(&_provider_order_id).await.unwrap().unwrap();

    handle_payment_timeout(&fx.ctx, payment.id).await.unwrap();

    let after = fx.store.find_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(after.status, PaymentStatus::Expired);
    assert_eq!(fx.bus.count_on(topics::ORDER_TIMEOUT), 1);

    // Running it again (second sweeper tick, or a race with the primary
    // expiry-listener path) must be a silent no-op.
    handle_payment_timeout(&fx.ctx, payment.id).await.unwrap();
    assert_eq!(fx.bus.count_on(topics::ORDER_TIMEOUT), 1, "no duplicate timeout event");
}

// Round-trip law: HandlePaymentTimeout after SuccessPayment is a no-op.
#[tokio::test]
async fn timeout_after_success_is_a_noop() {
    let (fx, provider_order_id) = created_payment(Provider::Stripe).await;
    success_payment(&fx.ctx, Provider::Stripe, &provider_order_id).await.unwrap();
    let payment = fx.store.find_by_provider_order_id(&provider_order_id).await.unwrap().unwrap();

    handle_payment_timeout(&fx.ctx, payment.id).await.unwrap();

    let after = fx.store.find_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(after.status, PaymentStatus::Success, "timeout never overrides a terminal success");
    assert_eq!(fx.bus.count_on(topics::ORDER_TIMEOUT), 0);
}

#[tokio::test]
async fn failure_payment_is_idempotent_and_rejects_non_pending() {
    let (fx, provider_order_id) = created_payment(Provider::Razorpay).await;

    failure_payment(&fx.ctx, Provider::Razorpay, &provider_order_id).await.unwrap();
    let payment = fx.store.find_by_provider_order_id(&provider_order_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(fx.bus.count_on(topics::ORDER_FAILED), 1);

    // Repeat failure on an already-FAILED payment: no-op, no second event.
    failure_payment(&fx.ctx, Provider::Razorpay, &provider_order_id).await.unwrap();
    assert_eq!(fx.bus.count_on(topics::ORDER_FAILED), 1);

    // A subsequent success attempt on a FAILED payment must be rejected.
    let err = success_payment(&fx.ctx, Provider::Razorpay, &provider_order_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)));
}

#[tokio::test]
async fn success_payment_not_found_surfaces_not_found() {
    let (fx, _provider_order_id) = created_payment(Provider::Stripe).await;
    let bogus = ProviderOrderId::new("po_does_not_exist");

    let err = success_payment(&fx.ctx, Provider::Stripe, &bogus).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

// Invariant (spec §8.2): at most one session may be CAPTURED.
#[tokio::test]
async fn captured_session_count_stays_at_most_one() {
    let (fx, provider_order_id) = created_payment(Provider::Stripe).await;
    success_payment(&fx.ctx, Provider::Stripe, &provider_order_id).await.unwrap();

    let payment = fx.store.find_by_provider_order_id(&provider_order_id).await.unwrap().unwrap();
    assert_eq!(payment.captured_session_count(), 1);
    payment.check_invariants().unwrap();
}
