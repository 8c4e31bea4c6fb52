//! Stripe implementation of the provider adapter port (spec §4.3), built on
//! the `async-stripe` crate.

use {
    crate::domain::{
        error::ServiceError,
        id::{ProviderOrderId, ProviderPaymentId},
        money::{Currency, Money, MoneyAmount},
        provider::{
            CancelResult, CreateSessionRequest, Provider, ProviderAdapter, ProviderSessionDetails,
            ProviderSessionResult, ProviderStatus, RefundRequest, RefundResult, RefundStatus,
            ResolveRequest, ResolveResult,
        },
    },
    async_trait::async_trait,
    std::str::FromStr,
};

pub struct StripeAdapter {
    client: stripe::Client,
}

impl StripeAdapter {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: stripe::Client::new(secret_key),
        }
    }

    fn to_stripe_currency(currency: Currency) -> Result<stripe::Currency, ServiceError> {
        stripe::Currency::from_str(&currency.as_str().to_ascii_lowercase())
            .map_err(|e| ServiceError::Provider(format!("unsupported currency for stripe: {e}")))
    }
}

#[async_trait]
impl ProviderAdapter for StripeAdapter {
    fn provider(&self) -> Provider {
        Provider::Stripe
    }

    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<ProviderSessionResult, ServiceError> {
        let currency = Self::to_stripe_currency(request.amount.currency())?;

        let line_items: Vec<stripe::CreateCheckoutSessionLineItems> = request
            .line_items
            .iter()
            .map(|item| stripe::CreateCheckoutSessionLineItems {
                quantity: Some(item.quantity as u64),
                price_data: Some(stripe::CreateCheckoutSessionLineItemsPriceData {
                    currency,
                    unit_amount: Some(item.unit_amount.amount().minor_units()),
                    product_data: Some(stripe::CreateCheckoutSessionLineItemsPriceDataProductData {
                        name: item.name.clone(),
                        images: item.image_url.clone().map(|u| vec![u]),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .collect();

        let mut params = stripe::CreateCheckoutSession::new();
        params.mode = Some(stripe::CheckoutSessionMode::Payment);
        params.line_items = Some(line_items);
        params.client_reference_id = Some(&request.order_id);
        params.customer_email = request.customer_email.as_deref();
        params.success_url = request.success_url.as_deref();
        params.cancel_url = request.cancel_url.as_deref();

        let session = stripe::CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| ServiceError::Provider(format!("stripe create_session: {e}")))?;

        let charged_amount = Money::new(
            MoneyAmount::new(session.amount_total.unwrap_or_default())?,
            request.amount.currency(),
        );

        Ok(ProviderSessionResult {
            provider_order_id: ProviderOrderId::new(session.id.to_string()),
            charged_amount,
            details: ProviderSessionDetails::Stripe {
                client_secret: session
                    .client_secret
                    .clone()
                    .unwrap_or_default(),
                hosted_url: session.url.clone().unwrap_or_default(),
            },
            metadata: serde_json::json!({ "livemode": session.livemode }),
        })
    }

    async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResult, ServiceError> {
        let provider_order_id = request.provider_order_id();
        let session_id = provider_order_id
            .as_str()
            .parse::<stripe::CheckoutSessionId>()
            .map_err(|e| ServiceError::Provider(format!("invalid checkout session id: {e}")))?;

        let session = stripe::CheckoutSession::retrieve(&self.client, &session_id, &[])
            .await
            .map_err(|e| ServiceError::Provider(format!("stripe resolve: {e}")))?;

        let provider_status = match session.payment_status {
            stripe::CheckoutSessionPaymentStatus::Paid => ProviderStatus::Captured,
            stripe::CheckoutSessionPaymentStatus::Unpaid => ProviderStatus::Pending,
            stripe::CheckoutSessionPaymentStatus::NoPaymentRequired => ProviderStatus::Captured,
        };

        let provider_payment_id = session.payment_intent.as_ref().map(|e| match e {
            stripe::Expandable::Id(id) => ProviderPaymentId::new(id.to_string()),
            stripe::Expandable::Object(pi) => ProviderPaymentId::new(pi.id.to_string()),
        });

        Ok(ResolveResult {
            provider_status,
            is_verified: matches!(provider_status, ProviderStatus::Captured),
            provider_payment_id,
        })
    }

    async fn cancel(
        &self,
        provider_order_id: &ProviderOrderId,
        _reason: Option<&str>,
    ) -> Result<CancelResult, ServiceError> {
        let session_id = provider_order_id
            .as_str()
            .parse::<stripe::CheckoutSessionId>()
            .map_err(|e| ServiceError::Provider(format!("invalid checkout session id: {e}")))?;

        match stripe::CheckoutSession::expire(&self.client, &session_id).await {
            Ok(_) => Ok(CancelResult { success: true }),
            Err(e) => {
                tracing::warn!(error = %e, "stripe checkout session expire failed");
                Ok(CancelResult { success: false })
            }
        }
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundResult, ServiceError> {
        let mut params = stripe::CreateRefund::new();
        params.amount = Some(request.amount.amount().minor_units());

        let refund = stripe::Refund::create(&self.client, params)
            .await
            .map_err(|e| ServiceError::Provider(format!("stripe refund: {e}")))?;

        let status = match refund.status.as_deref() {
            Some("succeeded") => RefundStatus::Success,
            Some("failed") | Some("canceled") => RefundStatus::Failed,
            _ => RefundStatus::Pending,
        };

        Ok(RefundResult {
            provider_refund_id: refund.id.to_string(),
            status,
        })
    }

    async fn is_available(&self) -> bool {
        stripe::Balance::retrieve(&self.client, &[]).await.is_ok()
    }
}
