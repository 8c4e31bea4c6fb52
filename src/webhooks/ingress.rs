//! Axum handlers for the three provider webhook endpoints (spec §4.5). Every
//! handler follows the same three steps — verify, normalize, publish — and
//! always answers `200 OK`: refusing to let invalid input poison the
//! pipeline also means never giving a forged or replayed request a signal
//! to retry with.

use {
    crate::{
        domain::events::ProviderEvent,
        domain::error::ServiceError,
        services::{context::ServiceContext, topics},
        webhooks::{normalize, signature::PaypalWebhookHeaders, signature},
    },
    axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
    },
    std::sync::Arc,
};

pub async fn stripe_webhook(
    State(ctx): State<Arc<ServiceContext>>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    if let Err(err) = handle_stripe(&ctx, &headers, &body).await {
        tracing::warn!(error = %err, "stripe webhook rejected");
    }
    StatusCode::OK
}

async fn handle_stripe(
    ctx: &ServiceContext,
    headers: &HeaderMap,
    body: &str,
) -> Result<(), ServiceError> {
    let sig = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::SignatureInvalid("missing Stripe-Signature header".into()))?;

    let event = signature::verify_stripe(body, sig, &ctx.webhook_secrets.stripe_webhook_secret)?;
    let raw: serde_json::Value = serde_json::from_str(body)?;

    match normalize::normalize_stripe(&event, raw) {
        Some(provider_event) => publish(ctx, provider_event).await,
        None => Ok(()),
    }
}

pub async fn razorpay_webhook(
    State(ctx): State<Arc<ServiceContext>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> StatusCode {
    if let Err(err) = handle_razorpay(&ctx, &headers, &body).await {
        tracing::warn!(error = %err, "razorpay webhook rejected");
    }
    StatusCode::OK
}

async fn handle_razorpay(
    ctx: &ServiceContext,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), ServiceError> {
    let sig = headers
        .get("X-Razorpay-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ServiceError::SignatureInvalid("missing X-Razorpay-Signature header".into())
        })?;

    signature::verify_razorpay(body, sig, &ctx.webhook_secrets.razorpay_webhook_secret)?;

    let raw: serde_json::Value = serde_json::from_slice(body)?;
    match normalize::normalize_razorpay(raw)? {
        Some(provider_event) => publish(ctx, provider_event).await,
        None => Ok(()),
    }
}

pub async fn paypal_webhook(
    State(ctx): State<Arc<ServiceContext>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> StatusCode {
    if let Err(err) = handle_paypal(&ctx, &headers, &body).await {
        tracing::warn!(error = %err, "paypal webhook rejected");
    }
    StatusCode::OK
}

async fn handle_paypal(
    ctx: &ServiceContext,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), ServiceError> {
    let header = |name: &str| -> Result<&str, ServiceError> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::SignatureInvalid(format!("missing {name} header")))
    };

    let paypal_headers = PaypalWebhookHeaders {
        transmission_id: header("Paypal-Transmission-Id")?,
        transmission_time: header("Paypal-Transmission-Time")?,
        cert_url: header("Paypal-Cert-Url")?,
        auth_algo: header("Paypal-Auth-Algo")?,
        transmission_sig: header("Paypal-Transmission-Sig")?,
    };

    ctx.paypal_cert_verifier.verify(&paypal_headers, body).await?;

    let raw: serde_json::Value = serde_json::from_slice(body)?;
    match normalize::normalize_paypal(raw)? {
        Some(provider_event) => publish(ctx, provider_event).await,
        None => Ok(()),
    }
}

async fn publish(ctx: &ServiceContext, event: ProviderEvent) -> Result<(), ServiceError> {
    let key = event.provider.as_str().to_string();
    let payload = serde_json::to_value(&event)?;
    ctx.bus.publish(topics::PROVIDER_EVENTS, &key, payload).await
}
