//! Normalizes a verified provider payload into the uniform `ProviderEvent`
//! shape published to `payment.provider-events.v1` (spec §4.5 step 2). Each
//! provider has its own allow-list of event types the rest of the pipeline
//! cares about; anything else is dropped here rather than forwarded.

use {
    crate::domain::{error::ServiceError, events::ProviderEvent, provider::Provider},
    chrono::Utc,
};

const STRIPE_ALLOWED: &[&str] = &[
    "checkout.session.completed",
    "payment_intent.succeeded",
    "payment_intent.payment_failed",
    "charge.refunded",
];

const RAZORPAY_ALLOWED: &[&str] = &[
    "payment.captured",
    "payment.failed",
    "order.paid",
    "refund.processed",
    "subscription.charged",
];

const PAYPAL_ALLOWED: &[&str] = &[
    "PAYMENT.CAPTURE.COMPLETED",
    "PAYMENT.CAPTURE.DENIED",
    "PAYMENT.CAPTURE.FAILED",
];

/// `None` means the event type is outside this service's allow-list and the
/// ingress handler should acknowledge it without publishing anything.
pub fn normalize_stripe(event: &stripe::Event, raw: serde_json::Value) -> Option<ProviderEvent> {
    let event_type = event.type_.to_string();
    if !STRIPE_ALLOWED.contains(&event_type.as_str()) {
        return None;
    }

    // Only `checkout.session.completed` carries the checkout session id
    // `createSession` stored as `providerOrderId` (spec §9 open question).
    // `payment_intent.*`/`charge.refunded` are accepted into the allow-list
    // but can't be located without it; the consumer acks and skips them as
    // an "ignored"/"skipped" webhook outcome.
    let (provider_order_id, provider_payment_id, order_id) = match &event.data.object {
        stripe::EventObject::CheckoutSession(session) => (
            Some(session.id.to_string()),
            session.payment_intent.as_ref().map(|e| match e {
                stripe::Expandable::Id(id) => id.to_string(),
                stripe::Expandable::Object(pi) => pi.id.to_string(),
            }),
            session.client_reference_id.clone(),
        ),
        stripe::EventObject::PaymentIntent(pi) => (None, Some(pi.id.to_string()), None),
        stripe::EventObject::Charge(charge) => (
            None,
            charge.payment_intent.as_ref().map(|e| match e {
                stripe::Expandable::Id(id) => id.to_string(),
                stripe::Expandable::Object(pi) => pi.id.to_string(),
            }),
            None,
        ),
        _ => (None, None, None),
    };

    Some(ProviderEvent {
        provider: Provider::Stripe,
        provider_event_id: event.id.to_string(),
        provider_event_type: event_type,
        provider_order_id,
        provider_payment_id,
        order_id,
        occurred_at: chrono::DateTime::from_timestamp(event.created, 0).unwrap_or_else(Utc::now),
        raw,
    })
}

pub fn normalize_razorpay(raw: serde_json::Value) -> Result<Option<ProviderEvent>, ServiceError> {
    let event_type = raw
        .get("event")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ServiceError::Validation("razorpay webhook missing event field".into()))?
        .to_string();

    if !RAZORPAY_ALLOWED.contains(&event_type.as_str()) {
        return Ok(None);
    }

    let payment_entity = raw
        .pointer("/payload/payment/entity")
        .or_else(|| raw.pointer("/payload/refund/entity"));

    let provider_event_id = payment_entity
        .and_then(|e| e.get("id"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            ServiceError::Validation("razorpay webhook missing payload entity id".into())
        })?
        .to_string();

    let provider_payment_id = raw
        .pointer("/payload/payment/entity/id")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    // Razorpay's own order id is what `createSession` returned as
    // `providerOrderId` (spec §4.3).
    let provider_order_id = raw
        .pointer("/payload/payment/entity/order_id")
        .or_else(|| raw.pointer("/payload/order/entity/id"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let order_id = raw
        .pointer("/payload/payment/entity/notes/order_id")
        .or_else(|| raw.pointer("/payload/order/entity/notes/order_id"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let occurred_at = raw
        .get("created_at")
        .and_then(|v| v.as_i64())
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);

    Ok(Some(ProviderEvent {
        provider: Provider::Razorpay,
        provider_event_id,
        provider_event_type: event_type,
        provider_order_id,
        provider_payment_id,
        order_id,
        occurred_at,
        raw,
    }))
}

pub fn normalize_paypal(raw: serde_json::Value) -> Result<Option<ProviderEvent>, ServiceError> {
    let event_type = raw
        .get("event_type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ServiceError::Validation("paypal webhook missing event_type field".into()))?
        .to_string();

    if !PAYPAL_ALLOWED.contains(&event_type.as_str()) {
        return Ok(None);
    }

    let provider_event_id = raw
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ServiceError::Validation("paypal webhook missing id field".into()))?
        .to_string();

    let resource = raw.get("resource");
    let provider_payment_id = resource
        .and_then(|r| r.get("id"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    // `supplementary_data.related_ids.order_id` is the checkout order id
    // `createSession` returned as `providerOrderId` (spec §4.3).
    let provider_order_id = resource
        .and_then(|r| r.pointer("/supplementary_data/related_ids/order_id"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let order_id = resource
        .and_then(|r| r.pointer("/custom_id").or_else(|| r.pointer("/invoice_id")))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let occurred_at = raw
        .get("create_time")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Ok(Some(ProviderEvent {
        provider: Provider::Paypal,
        provider_event_id,
        provider_event_type: event_type,
        provider_order_id,
        provider_payment_id,
        order_id,
        occurred_at,
        raw,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn razorpay_disallowed_event_type_is_dropped() {
        let raw = serde_json::json!({ "event": "subscription.cancelled" });
        assert!(normalize_razorpay(raw).unwrap().is_none());
    }

    #[test]
    fn razorpay_payment_captured_extracts_order_and_payment_ids() {
        let raw = serde_json::json!({
            "event": "payment.captured",
            "created_at": 1_700_000_000,
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_abc123",
                        "order_id": "order_xyz789",
                        "notes": { "order_id": "order-1" }
                    }
                }
            }
        });

        let event = normalize_razorpay(raw).unwrap().unwrap();
        assert_eq!(event.provider, Provider::Razorpay);
        assert_eq!(event.provider_event_id, "pay_abc123");
        assert_eq!(event.provider_event_type, "payment.captured");
        assert_eq!(event.provider_order_id.as_deref(), Some("order_xyz789"));
        assert_eq!(event.provider_payment_id.as_deref(), Some("pay_abc123"));
        assert_eq!(event.order_id.as_deref(), Some("order-1"));
    }

    #[test]
    fn razorpay_missing_event_field_is_a_validation_error() {
        let raw = serde_json::json!({ "payload": {} });
        assert!(normalize_razorpay(raw).is_err());
    }

    #[test]
    fn paypal_disallowed_event_type_is_dropped() {
        let raw = serde_json::json!({ "id": "WH-1", "event_type": "BILLING.SUBSCRIPTION.CANCELLED" });
        assert!(normalize_paypal(raw).unwrap().is_none());
    }

    #[test]
    fn paypal_capture_completed_extracts_ids() {
        let raw = serde_json::json!({
            "id": "WH-EVT-1",
            "event_type": "PAYMENT.CAPTURE.COMPLETED",
            "create_time": "2024-01-15T10:00:00Z",
            "resource": {
                "id": "CAPTURE-1",
                "custom_id": "order-42",
                "supplementary_data": {
                    "related_ids": { "order_id": "EC-ORDER-1" }
                }
            }
        });

        let event = normalize_paypal(raw).unwrap().unwrap();
        assert_eq!(event.provider, Provider::Paypal);
        assert_eq!(event.provider_event_id, "WH-EVT-1");
        assert_eq!(event.provider_order_id.as_deref(), Some("EC-ORDER-1"));
        assert_eq!(event.provider_payment_id.as_deref(), Some("CAPTURE-1"));
        assert_eq!(event.order_id.as_deref(), Some("order-42"));
    }

    #[test]
    fn paypal_missing_id_is_a_validation_error() {
        let raw = serde_json::json!({ "event_type": "PAYMENT.CAPTURE.COMPLETED" });
        assert!(normalize_paypal(raw).is_err());
    }
}
