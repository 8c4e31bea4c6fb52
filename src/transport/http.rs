//! Axum router assembly: the RPC endpoints (spec §4.4), the webhook ingress
//! endpoints (spec §4.5), and a health check for deployment liveness probes.

use {
    crate::{
        domain::{id::IdempotencyKey, error::ServiceError, provider::ResolveRequest},
        services::{
            cancel_payment::{cancel_payment, CancelPaymentRequest},
            context::ServiceContext,
            create_payment::{create_payment, CreatePaymentRequest},
            resolve_payment::resolve_payment,
        },
        transport::rpc::{ok, RpcFailure, RpcResponse},
        webhooks::ingress,
    },
    axum::{
        Json, Router,
        extract::State,
        http::HeaderMap,
        routing::{get, post},
    },
    std::sync::Arc,
};

const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

fn idempotency_key(headers: &HeaderMap) -> Result<IdempotencyKey, ServiceError> {
    let raw = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServiceError::MissingIdempotencyKey)?;
    let uuid = raw
        .parse::<uuid::Uuid>()
        .map_err(|_| ServiceError::Validation("idempotency key must be a uuid".into()))?;
    Ok(IdempotencyKey::new(uuid))
}

pub fn router(ctx: Arc<ServiceContext>) -> Router {
    Router::new()
        .route("/rpc/create-payment", post(create_payment_handler))
        .route("/rpc/resolve-payment", post(resolve_payment_handler))
        .route("/rpc/cancel-payment", post(cancel_payment_handler))
        .route("/api/webhooks/stripe", post(ingress::stripe_webhook))
        .route("/api/webhooks/paypal", post(ingress::paypal_webhook))
        .route("/api/webhooks/razorpay", post(ingress::razorpay_webhook))
        .route("/healthz", get(health_check_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn create_payment_handler(
    State(ctx): State<Arc<ServiceContext>>,
    headers: HeaderMap,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<RpcResponse<crate::domain::provider::ProviderSessionResult>>, RpcFailure> {
    let key = idempotency_key(&headers)?;
    let result = create_payment(&ctx, key, request).await?;
    Ok(ok(result))
}

async fn resolve_payment_handler(
    State(ctx): State<Arc<ServiceContext>>,
    headers: HeaderMap,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<RpcResponse<crate::services::resolve_payment::ResolvePaymentResult>>, RpcFailure> {
    let key = idempotency_key(&headers)?;
    let result = resolve_payment(&ctx, key, request).await?;
    Ok(ok(result))
}

async fn cancel_payment_handler(
    State(ctx): State<Arc<ServiceContext>>,
    headers: HeaderMap,
    Json(request): Json<CancelPaymentRequest>,
) -> Result<Json<RpcResponse<crate::services::cancel_payment::CancelPaymentResult>>, RpcFailure> {
    let key = idempotency_key(&headers)?;
    let result = cancel_payment(&ctx, key, request).await?;
    Ok(ok(result))
}

/// Pings every configured provider plus the store/cache so deployment
/// tooling can distinguish "service up" from "service actually usable".
/// `HealthCheck` is one of the four RPCs sharing the `{success | error}`
/// envelope (spec §6), so this answers through `RpcResponse` like the other
/// three handlers rather than a bare JSON body.
async fn health_check_handler(State(ctx): State<Arc<ServiceContext>>) -> Json<RpcResponse<serde_json::Value>> {
    let mut providers = serde_json::Map::new();
    for (provider, adapter) in ctx.providers.iter() {
        providers.insert(provider.as_str().to_string(), serde_json::json!(adapter.is_available().await));
    }

    let store_ok = ctx
        .store
        .due_for_timeout(chrono::Utc::now(), 1)
        .await
        .is_ok();
    let cache_ok = ctx.cache.exists("healthcheck:probe").await.is_ok();

    ok(serde_json::json!({
        "store": store_ok,
        "cache": cache_ok,
        "providers": providers,
    }))
}
