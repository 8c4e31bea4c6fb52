mod common;

use common::*;
use payment_orchestrator::{
    domain::{
        money::Currency,
        payment::{PaymentStatus, ProviderSessionStatus},
        provider::Provider,
    },
    ports::order::OrderStatus,
    services::{create_payment::{create_payment, CreatePaymentRequest}, topics},
};
use std::sync::Arc;

fn request(provider: Provider) -> CreatePaymentRequest {
    CreatePaymentRequest {
        user_id: "user-1".to_string(),
        order_id: "order-1".to_string(),
        provider,
        success_url: Some("https://app.example/success".into()),
        cancel_url: Some("https://app.example/cancel".into()),
    }
}

// spec §8 scenario 1: happy path, Stripe.
#[tokio::test]
async fn happy_path_stripe_creates_payment_and_publishes_initiated() {
    let store = Arc::new(FakeStore::default());
    let cache = Arc::new(FakeCache::default());
    let bus = Arc::new(FakeBus::default());
    let order = FakeOrder::payable("order-1", 5000, "USD");
    let adapter = Arc::new(FakeAdapter::new(Provider::Stripe));
    let providers = single_provider(Provider::Stripe, adapter.clone());

    let ctx = build_context(store.clone(), cache, bus.clone(), order, providers);
    let key = random_idempotency_key();

    let result = create_payment(&ctx, key, request(Provider::Stripe)).await.unwrap();

    assert_eq!(result.charged_amount.amount().minor_units(), 5000);
    assert_eq!(result.charged_amount.currency(), Currency::Usd);
    assert_eq!(store.count(), 1);
    assert_eq!(adapter.create_calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    let payment = store
        .find_by_idempotency_key(&key)
        .await
        .unwrap()
        .expect("payment persisted");
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.sessions.len(), 1);
    assert_eq!(payment.sessions[0].status, ProviderSessionStatus::Created);
    assert_eq!(payment.provider_order_id, Some(result.provider_order_id));

    assert_eq!(bus.count_on(topics::ORDER_INITIATED), 1);
}

// spec §8 scenario 2: duplicate create with the same idempotency key.
#[tokio::test]
async fn duplicate_create_with_same_key_does_not_create_a_second_session() {
    let store = Arc::new(FakeStore::default());
    let cache = Arc::new(FakeCache::default());
    let bus = Arc::new(FakeBus::default());
    let order = FakeOrder::payable("order-1", 5000, "USD");
    let adapter = Arc::new(FakeAdapter::new(Provider::Stripe));
    let providers = single_provider(Provider::Stripe, adapter.clone());

    let ctx = build_context(store.clone(), cache, bus.clone(), order, providers);
    let key = random_idempotency_key();

    let first = create_payment(&ctx, key, request(Provider::Stripe)).await.unwrap();
    let second = create_payment(&ctx, key, request(Provider::Stripe)).await.unwrap();

    assert_eq!(first.provider_order_id, second.provider_order_id);
    assert_eq!(store.count(), 1, "store contains exactly one Payment");
    assert_eq!(
        adapter.create_calls.load(std::sync::atomic::Ordering::SeqCst),
        1,
        "second call returns the cached result, fn is not re-executed"
    );
    assert_eq!(bus.count_on(topics::ORDER_INITIATED), 1, "no duplicate event");
}

// spec §8 scenario 6: cross-currency Razorpay with FX conversion.
#[tokio::test]
async fn cross_currency_razorpay_converts_using_fx_rate() {
    let store = Arc::new(FakeStore::default());
    let cache = Arc::new(FakeCache::default());
    let bus = Arc::new(FakeBus::default());
    let order = FakeOrder::payable("order-1", 10000, "EUR");
    let adapter = Arc::new(FakeAdapter::new(Provider::Razorpay));
    let providers = single_provider(Provider::Razorpay, adapter.clone());

    let mut ctx = build_context(store.clone(), cache, bus.clone(), order, providers);
    ctx.exchange = Arc::new(FakeExchange::rate("1.08"));

    let key = random_idempotency_key();
    let result = create_payment(&ctx, key, request(Provider::Razorpay)).await.unwrap();

    assert_eq!(result.charged_amount.currency(), Currency::Usd);
    assert_eq!(result.charged_amount.amount().minor_units(), 10800);

    let payment = store.find_by_idempotency_key(&key).await.unwrap().unwrap();
    assert_eq!(payment.sessions[0].fx_rate.unwrap().to_string(), "1.08");
}

#[tokio::test]
async fn invalid_order_state_is_rejected() {
    let store = Arc::new(FakeStore::default());
    let cache = Arc::new(FakeCache::default());
    let bus = Arc::new(FakeBus::default());
    let order = FakeOrder::payable("order-1", 5000, "USD").with_status(OrderStatus::Completed);
    let adapter = Arc::new(FakeAdapter::new(Provider::Stripe));
    let providers = single_provider(Provider::Stripe, adapter);

    let ctx = build_context(store, cache, bus, order, providers);
    let key = random_idempotency_key();

    let err = create_payment(&ctx, key, request(Provider::Stripe)).await.unwrap_err();
    assert!(matches!(err, payment_orchestrator::domain::error::ServiceError::InvalidOrderState(_)));
}

#[tokio::test]
async fn amount_mismatch_when_provider_charges_a_different_total() {
    let store = Arc::new(FakeStore::default());
    let cache = Arc::new(FakeCache::default());
    let bus = Arc::new(FakeBus::default());
    let order = FakeOrder::payable("order-1", 5000, "USD");
    let adapter = Arc::new(FakeAdapter::new(Provider::Stripe));
    *adapter.charged_amount_override.lock().unwrap() = Some(money(4000, Currency::Usd));
    let providers = single_provider(Provider::Stripe, adapter);

    let ctx = build_context(store, cache, bus, order, providers);
    let key = random_idempotency_key();

    let err = create_payment(&ctx, key, request(Provider::Stripe)).await.unwrap_err();
    assert!(matches!(err, payment_orchestrator::domain::error::ServiceError::AmountMismatch(_)));
}
