//! PayPal implementation of the provider adapter port (spec §4.3). PayPal
//! has no official Rust SDK in this pack's lineage, so this talks to the
//! REST API directly via `reqwest`, the crate the wider pack reaches for
//! whenever a provider lacks a typed client (see `DESIGN.md`).

use {
    crate::domain::{
        error::ServiceError,
        id::{ProviderOrderId, ProviderPaymentId},
        money::Money,
        provider::{
            CancelResult, CreateSessionRequest, Provider, ProviderAdapter, ProviderSessionDetails,
            ProviderSessionResult, ProviderStatus, RefundRequest, RefundResult, RefundStatus,
            ResolveRequest, ResolveResult,
        },
    },
    async_trait::async_trait,
    serde::Deserialize,
    serde_json::json,
};

pub struct PaypalAdapter {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl PaypalAdapter {
    pub fn new(base_url: impl Into<String>, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    async fn access_token(&self) -> Result<String, ServiceError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let resp = self
            .http
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ServiceError::Provider(format!("paypal oauth: {e}")))?
            .error_for_status()
            .map_err(|e| ServiceError::Provider(format!("paypal oauth: {e}")))?
            .json::<TokenResponse>()
            .await
            .map_err(|e| ServiceError::Provider(format!("paypal oauth decode: {e}")))?;

        Ok(resp.access_token)
    }
}

#[async_trait]
impl ProviderAdapter for PaypalAdapter {
    fn provider(&self) -> Provider {
        Provider::Paypal
    }

    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<ProviderSessionResult, ServiceError> {
        let token = self.access_token().await?;

        let purchase_units = json!([{
            "reference_id": request.order_id,
            "amount": {
                "currency_code": request.amount.currency().as_str(),
                "value": minor_to_major_str(request.amount),
                "breakdown": {
                    "item_total": {
                        "currency_code": request.amount.currency().as_str(),
                        "value": minor_to_major_str(request.amount),
                    }
                }
            },
            "items": request.line_items.iter().map(|item| json!({
                "name": item.name,
                "quantity": item.quantity.to_string(),
                "unit_amount": {
                    "currency_code": item.unit_amount.currency().as_str(),
                    "value": minor_to_major_str(item.unit_amount),
                },
            })).collect::<Vec<_>>(),
        }]);

        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": purchase_units,
            "application_context": {
                "return_url": request.success_url,
                "cancel_url": request.cancel_url,
            }
        });

        let resp: serde_json::Value = self
            .http
            .post(format!("{}/v2/checkout/orders", self.base_url))
            .bearer_auth(&token)
            .header("PayPal-Request-Id", &request.idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Provider(format!("paypal create order: {e}")))?
            .error_for_status()
            .map_err(|e| ServiceError::Provider(format!("paypal create order: {e}")))?
            .json()
            .await
            .map_err(|e| ServiceError::Provider(format!("paypal create order decode: {e}")))?;

        let order_id = resp["id"]
            .as_str()
            .ok_or_else(|| ServiceError::Provider("paypal response missing id".into()))?
            .to_string();

        let approval_url = resp["links"]
            .as_array()
            .and_then(|links| links.iter().find(|l| l["rel"] == "approve"))
            .and_then(|l| l["href"].as_str())
            .unwrap_or_default()
            .to_string();

        Ok(ProviderSessionResult {
            provider_order_id: ProviderOrderId::new(order_id),
            charged_amount: request.amount,
            details: ProviderSessionDetails::Paypal { approval_url },
            metadata: resp,
        })
    }

    async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResult, ServiceError> {
        let provider_order_id = request.provider_order_id();
        let token = self.access_token().await?;

        let resp: serde_json::Value = self
            .http
            .post(format!(
                "{}/v2/checkout/orders/{}/capture",
                self.base_url,
                provider_order_id.as_str()
            ))
            .bearer_auth(&token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| ServiceError::Provider(format!("paypal capture: {e}")))?
            .json()
            .await
            .map_err(|e| ServiceError::Provider(format!("paypal capture decode: {e}")))?;

        let status = resp["status"].as_str().unwrap_or("");
        let provider_status = match status {
            "COMPLETED" => ProviderStatus::Captured,
            "VOIDED" | "DECLINED" => ProviderStatus::Failed,
            _ => ProviderStatus::Pending,
        };

        let capture_id = resp["purchase_units"][0]["payments"]["captures"][0]["id"]
            .as_str()
            .map(ProviderPaymentId::new);

        Ok(ResolveResult {
            provider_status,
            is_verified: provider_status == ProviderStatus::Captured,
            provider_payment_id: capture_id,
        })
    }

    /// PayPal exposes no order-cancel endpoint; cancellation is recorded
    /// locally only (spec §4.3). The local transition always proceeds for
    /// a `PENDING` payment regardless of this result.
    async fn cancel(
        &self,
        _provider_order_id: &ProviderOrderId,
        _reason: Option<&str>,
    ) -> Result<CancelResult, ServiceError> {
        Ok(CancelResult { success: true })
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundResult, ServiceError> {
        let token = self.access_token().await?;

        let body = json!({
            "amount": {
                "currency_code": request.amount.currency().as_str(),
                "value": minor_to_major_str(request.amount),
            }
        });

        let resp: serde_json::Value = self
            .http
            .post(format!(
                "{}/v2/payments/captures/{}/refund",
                self.base_url,
                request.provider_order_id.as_str()
            ))
            .bearer_auth(&token)
            .header("PayPal-Request-Id", &request.idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Provider(format!("paypal refund: {e}")))?
            .json()
            .await
            .map_err(|e| ServiceError::Provider(format!("paypal refund decode: {e}")))?;

        let status = match resp["status"].as_str().unwrap_or("") {
            "COMPLETED" => RefundStatus::Success,
            "FAILED" => RefundStatus::Failed,
            _ => RefundStatus::Pending,
        };

        Ok(RefundResult {
            provider_refund_id: resp["id"].as_str().unwrap_or_default().to_string(),
            status,
        })
    }

    async fn is_available(&self) -> bool {
        self.access_token().await.is_ok()
    }
}

/// PayPal's REST API takes amounts as major-unit decimal strings (spec §9
/// "amount units": the minor→major conversion is the adapter's job, not the
/// domain's). `rust_decimal` avoids the float drift a plain `as f64` division
/// would introduce.
fn minor_to_major_str(money: Money) -> String {
    (rust_decimal::Decimal::from(money.amount().minor_units()) / rust_decimal::Decimal::from(100))
        .round_dp(2)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        money::{Currency, MoneyAmount},
        provider::LineItem,
    };
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[test]
    fn minor_to_major_rounds_to_two_decimal_places() {
        let money = Money::new(MoneyAmount::new(5099).unwrap(), Currency::Usd);
        assert_eq!(minor_to_major_str(money), "50.99");
    }

    fn session_request() -> CreateSessionRequest {
        CreateSessionRequest {
            user_id: "user-1".into(),
            amount: Money::new(MoneyAmount::new(5000).unwrap(), Currency::Usd),
            idempotency_key: "idem-1".into(),
            order_id: "order-1".into(),
            line_items: vec![LineItem {
                name: "Course".into(),
                quantity: 1,
                unit_amount: Money::new(MoneyAmount::new(5000).unwrap(), Currency::Usd),
                image_url: None,
            }],
            success_url: Some("https://app.example/success".into()),
            cancel_url: Some("https://app.example/cancel".into()),
            description: None,
            customer_email: None,
        }
    }

    async fn mock_oauth(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "A21AAtest",
                "token_type": "Bearer",
                "expires_in": 32400,
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn create_session_returns_the_approval_link() {
        let server = MockServer::start().await;
        mock_oauth(&server).await;

        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "5O190127TN364715T",
                "status": "CREATED",
                "links": [
                    { "rel": "self", "href": "https://api.paypal.com/v2/checkout/orders/5O190127TN364715T" },
                    { "rel": "approve", "href": "https://www.paypal.com/checkoutnow?token=5O190127TN364715T" },
                ],
            })))
            .mount(&server)
            .await;

        let adapter = PaypalAdapter::new(server.uri(), "client-id", "client-secret");
        let result = adapter.create_session(&session_request()).await.unwrap();

        assert_eq!(result.provider_order_id.as_str(), "5O190127TN364715T");
        match result.details {
            ProviderSessionDetails::Paypal { approval_url } => {
                assert_eq!(approval_url, "https://www.paypal.com/checkoutnow?token=5O190127TN364715T");
            }
            other => panic!("expected paypal details, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolve_maps_completed_status_to_captured_and_verified() {
        let server = MockServer::start().await;
        mock_oauth(&server).await;

        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/5O190127TN364715T/capture"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "COMPLETED",
                "purchase_units": [{
                    "payments": { "captures": [{ "id": "3C679366WU5667414" }] }
                }]
            })))
            .mount(&server)
            .await;

        let adapter = PaypalAdapter::new(server.uri(), "client-id", "client-secret");
        let result = adapter
            .resolve(&ResolveRequest::Paypal {
                provider_order_id: ProviderOrderId::new("5O190127TN364715T"),
            })
            .await
            .unwrap();

        assert_eq!(result.provider_status, ProviderStatus::Captured);
        assert!(result.is_verified);
        assert_eq!(result.provider_payment_id.unwrap().as_str(), "3C679366WU5667414");
    }

    #[tokio::test]
    async fn cancel_is_a_local_no_remote_call_success() {
        let server = MockServer::start().await;
        let adapter = PaypalAdapter::new(server.uri(), "client-id", "client-secret");

        let result = adapter
            .cancel(&ProviderOrderId::new("5O190127TN364715T"), Some("user requested"))
            .await
            .unwrap();
        assert!(result.success);
    }
}
