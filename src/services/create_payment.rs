//! `CreatePayment` (spec §4.4). Wrapped end-to-end by the idempotency engine.

use {
    crate::domain::{
        audit::NewAuditEntry,
        error::ServiceError,
        events::{BusEnvelope, OrderPaymentInitiated},
        id::IdempotencyKey,
        money::{convert_minor_units, Currency, Money, MoneyAmount},
        payment::Payment,
        provider::{CreateSessionRequest, LineItem, Provider, ProviderSessionResult},
    },
    crate::idempotency::with_idempotency,
    crate::infra::retry::with_retry,
    crate::services::{context::ServiceContext, topics},
    serde::{Deserialize, Serialize},
    std::time::Duration,
};

const CREATE_SESSION_ATTEMPTS: u32 = 3;
const CREATE_SESSION_DEADLINE: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub user_id: String,
    pub order_id: String,
    pub provider: Provider,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

pub async fn create_payment(
    ctx: &ServiceContext,
    idempotency_key: IdempotencyKey,
    request: CreatePaymentRequest,
) -> Result<ProviderSessionResult, ServiceError> {
    with_idempotency(ctx.cache.as_ref(), &idempotency_key, || {
        execute(ctx, idempotency_key, &request)
    })
    .await
}

async fn execute(
    ctx: &ServiceContext,
    idempotency_key: IdempotencyKey,
    request: &CreatePaymentRequest,
) -> Result<ProviderSessionResult, ServiceError> {
    // Step 1: order lookup + payability check.
    let order = ctx
        .order
        .get_order_by_id(&request.order_id, &request.user_id)
        .await?;
    if !order.status.is_payable() {
        return Err(ServiceError::InvalidOrderState(format!(
            "order {} has status {:?}",
            request.order_id, order.status
        )));
    }
    // Step 2: course metadata for line items.
    let course_ids: Vec<String> = order.items.iter().map(|i| i.course_id.clone()).collect();
    let courses = ctx.course.get_courses_by_ids(&course_ids).await?;

    let order_currency = Currency::try_from(order.amount.currency.as_str())?;
    let order_total = MoneyAmount::new(order.amount.total)?;

    let adapter = ctx.adapter(request.provider)?;

    // Step 3: FX conversion when the provider doesn't support the order's currency.
    let (fx_rate, fx_timestamp, target_currency) = if adapter.is_currency_supported(order_currency) {
        (None, None, order_currency)
    } else {
        let rate = ctx.exchange.get_rate(order_currency, Currency::Usd).await?;
        (Some(rate.rate), Some(rate.timestamp), Currency::Usd)
    };

    let converted_total = match fx_rate {
        Some(rate) => convert_minor_units(order_total, rate),
        None => order_total,
    };

    // Step 4: per-item conversion + ±1 minor unit reconciliation.
    let mut line_items = Vec::with_capacity(order.items.len());
    let mut sum = MoneyAmount::zero();
    for item in &order.items {
        let item_amount = MoneyAmount::new(item.price)?;
        let converted_item = match fx_rate {
            Some(rate) => convert_minor_units(item_amount, rate),
            None => item_amount,
        };
        sum = sum
            .checked_add(converted_item)
            .ok_or_else(|| ServiceError::AmountMismatch("line item sum overflowed".into()))?;

        let course = courses.get(&item.course_id);
        line_items.push(LineItem {
            name: course.map(|c| c.title.clone()).unwrap_or_else(|| item.course_id.clone()),
            quantity: 1,
            unit_amount: Money::new(converted_item, target_currency),
            image_url: course.and_then(|c| c.thumbnail.clone()),
        });
    }

    if sum.abs_diff(converted_total) > 1 {
        return Err(ServiceError::AmountMismatch(format!(
            "line item sum {sum} does not reconcile with order total {converted_total}"
        )));
    }

    // Step 5: find-or-create the Payment aggregate.
    let original_money = Money::new(order_total, order_currency);
    let existing = ctx.store.find_by_idempotency_key(&idempotency_key).await?;
    let is_new = existing.is_none();
    let mut payment = existing.unwrap_or_else(|| {
        Payment::new(
            request.user_id.as_str(),
            request.order_id.as_str(),
            original_money,
            idempotency_key,
        )
    });

    // Step 6: create the provider session (bounded retry).
    let session_request = CreateSessionRequest {
        user_id: request.user_id.clone(),
        amount: Money::new(converted_total, target_currency),
        idempotency_key: idempotency_key.to_string(),
        order_id: request.order_id.clone(),
        line_items,
        success_url: request.success_url.clone(),
        cancel_url: request.cancel_url.clone(),
        description: None,
        customer_email: None,
    };

    let result = with_retry(CREATE_SESSION_ATTEMPTS, CREATE_SESSION_DEADLINE, || {
        adapter.create_session(&session_request)
    })
    .await?;

    // Step 7: reconcile the provider's charged amount against both totals.
    if result.charged_amount.amount().abs_diff(converted_total) > 1
        || result.charged_amount.amount().abs_diff(order_total) > 1
    {
        return Err(ServiceError::AmountMismatch(format!(
            "provider charged {} but expected {}",
            result.charged_amount.amount(),
            converted_total
        )));
    }

    // Steps 8-9: append the session, stamp providerOrderId.
    let session = crate::domain::payment::ProviderSession::new(
        payment.id,
        request.provider,
        result.provider_order_id.clone(),
        result.charged_amount,
        fx_rate,
        fx_timestamp,
        result.metadata.clone(),
    );
    payment.append_session(session);
    payment.provider_order_id = Some(result.provider_order_id.clone());
    payment.check_invariants()?;

    // Step 10: persist atomically.
    if is_new {
        ctx.store.create(&payment).await?;
    } else {
        ctx.store.save(&payment).await?;
    }

    ctx.audit
        .record(&NewAuditEntry::new(
            Some(payment.id),
            Some(result.provider_order_id.as_str().to_string()),
            "system",
            "payment.created",
            serde_json::json!({ "provider": request.provider, "orderId": request.order_id }),
        ))
        .await?;

    if is_new {
        // Step 11: schedule the timeout record.
        let ttl_secs = (payment.expires_at - chrono::Utc::now()).num_seconds().max(1) as u64;
        let timeout_key = format!("payments:timeout:{}", payment.id);
        let timeout_value = serde_json::json!({
            "paymentId": payment.id,
            "orderId": payment.order_id,
            "userId": payment.user_id,
            "expiresAt": payment.expires_at,
        })
        .to_string();
        ctx.cache
            .set(&timeout_key, &timeout_value, Duration::from_secs(ttl_secs))
            .await?;

        // Step 12: publish OrderPaymentInitiated.
        let envelope = BusEnvelope::wrap(
            "OrderPaymentInitiated",
            OrderPaymentInitiated {
                payment_id: payment.id,
                user_id: payment.user_id.clone(),
                order_id: payment.order_id.clone(),
                provider: request.provider,
                provider_order_id: result.provider_order_id.clone(),
                payment_status: payment.status,
            },
        );
        ctx.bus
            .publish(
                topics::ORDER_INITIATED,
                &payment.user_id,
                serde_json::to_value(&envelope)?,
            )
            .await?;
    }

    // Step 13.
    Ok(result)
}
