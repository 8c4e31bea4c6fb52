//! Razorpay implementation of the provider adapter port (spec §4.3). Like
//! PayPal, Razorpay has no idiomatic Rust SDK in this pack's lineage, so
//! this talks to the Orders API directly via `reqwest`. Razorpay resolve
//! calls carry a client-supplied HMAC signature that must be verified
//! against the order+payment id pair before the provider is trusted
//! (spec §4.3 "Razorpay: verifies an HMAC-SHA256 signature").

use {
    crate::domain::{
        error::ServiceError,
        id::{ProviderOrderId, ProviderPaymentId},
        provider::{
            CancelResult, CreateSessionRequest, Provider, ProviderAdapter, ProviderSessionDetails,
            ProviderSessionResult, ProviderStatus, RefundRequest, RefundResult, RefundStatus,
            ResolveRequest, ResolveResult,
        },
    },
    async_trait::async_trait,
    hmac::{Hmac, Mac},
    sha2::Sha256,
    subtle::ConstantTimeEq,
};

type HmacSha256 = Hmac<Sha256>;

pub struct RazorpayAdapter {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayAdapter {
    pub fn new(base_url: impl Into<String>, key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        }
    }

    /// `HMAC_SHA256(key_secret, "orderId|paymentId")` hex-encoded, compared
    /// in constant time (spec §4.3). Used both by `resolve` and by the
    /// webhook ingress path for payment-link style callbacks.
    pub fn verify_payment_signature(
        key_secret: &str,
        provider_order_id: &str,
        provider_payment_id: &str,
        signature_hex: &str,
    ) -> Result<(), ServiceError> {
        let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes())
            .map_err(|e| ServiceError::SignatureInvalid(format!("bad hmac key: {e}")))?;
        mac.update(format!("{provider_order_id}|{provider_payment_id}").as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        let signature_bytes = hex::decode(signature_hex)
            .map_err(|_| ServiceError::SignatureInvalid("signature is not valid hex".into()))?;
        let expected_bytes = hex::decode(&expected).expect("hex::encode output is always valid hex");

        if signature_bytes.ct_eq(&expected_bytes).unwrap_u8() == 1 {
            Ok(())
        } else {
            Err(ServiceError::SignatureInvalid(
                "razorpay signature mismatch".into(),
            ))
        }
    }

    async fn list_order_payments(
        &self,
        provider_order_id: &ProviderOrderId,
    ) -> Result<Vec<serde_json::Value>, ServiceError> {
        let resp: serde_json::Value = self
            .http
            .get(format!(
                "{}/v1/orders/{}/payments",
                self.base_url,
                provider_order_id.as_str()
            ))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(|e| ServiceError::Provider(format!("razorpay list payments: {e}")))?
            .error_for_status()
            .map_err(|e| ServiceError::Provider(format!("razorpay list payments: {e}")))?
            .json()
            .await
            .map_err(|e| ServiceError::Provider(format!("razorpay list payments decode: {e}")))?;

        Ok(resp["items"].as_array().cloned().unwrap_or_default())
    }

    /// Zero-amount capture voids an `authorized` payment that was never
    /// captured (spec §4.3).
    async fn void_authorized_payment(&self, payment_id: &str) -> Result<(), ServiceError> {
        self.http
            .post(format!("{}/v1/payments/{}/capture", self.base_url, payment_id))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&serde_json::json!({ "amount": 0 }))
            .send()
            .await
            .map_err(|e| ServiceError::Provider(format!("razorpay zero-capture: {e}")))?
            .error_for_status()
            .map_err(|e| ServiceError::Provider(format!("razorpay zero-capture: {e}")))?;
        Ok(())
    }

    /// A payment already `captured` can only be undone with a full refund
    /// (spec §4.3).
    async fn refund_captured_payment(&self, payment_id: &str, reason: Option<&str>) -> Result<(), ServiceError> {
        self.http
            .post(format!("{}/v1/payments/{}/refund", self.base_url, payment_id))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&serde_json::json!({ "notes": { "reason": reason.unwrap_or("payment cancelled") } }))
            .send()
            .await
            .map_err(|e| ServiceError::Provider(format!("razorpay cancel-refund: {e}")))?
            .error_for_status()
            .map_err(|e| ServiceError::Provider(format!("razorpay cancel-refund: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for RazorpayAdapter {
    fn provider(&self) -> Provider {
        Provider::Razorpay
    }

    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<ProviderSessionResult, ServiceError> {
        let body = serde_json::json!({
            "amount": request.amount.amount().minor_units(),
            "currency": request.amount.currency().as_str(),
            "receipt": request.order_id,
            "notes": { "order_id": request.order_id },
        });

        let resp: serde_json::Value = self
            .http
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .header("X-Razorpay-Idempotency-Key", &request.idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Provider(format!("razorpay create order: {e}")))?
            .error_for_status()
            .map_err(|e| ServiceError::Provider(format!("razorpay create order: {e}")))?
            .json()
            .await
            .map_err(|e| ServiceError::Provider(format!("razorpay create order decode: {e}")))?;

        let order_id = resp["id"]
            .as_str()
            .ok_or_else(|| ServiceError::Provider("razorpay response missing id".into()))?
            .to_string();

        Ok(ProviderSessionResult {
            provider_order_id: ProviderOrderId::new(order_id),
            charged_amount: request.amount,
            details: ProviderSessionDetails::Razorpay {
                key_id: self.key_id.clone(),
            },
            metadata: resp,
        })
    }

    /// Razorpay's resolve path is almost entirely client-side: the checkout
    /// widget hands the caller `(orderId, paymentId, signature)` directly,
    /// so this verifies the signature locally before the optional
    /// fetch-and-confirm call against the Payments API (spec §4.3).
    async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResult, ServiceError> {
        let ResolveRequest::Razorpay {
            provider_order_id,
            provider_payment_id,
            signature,
        } = request
        else {
            return Err(ServiceError::Validation(
                "resolve request is not a razorpay variant".into(),
            ));
        };

        Self::verify_payment_signature(
            &self.key_secret,
            provider_order_id.as_str(),
            provider_payment_id.as_str(),
            signature,
        )?;

        let resp: serde_json::Value = self
            .http
            .get(format!(
                "{}/v1/payments/{}",
                self.base_url,
                provider_payment_id.as_str()
            ))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(|e| ServiceError::Provider(format!("razorpay fetch payment: {e}")))?
            .json()
            .await
            .map_err(|e| ServiceError::Provider(format!("razorpay fetch payment decode: {e}")))?;

        let provider_status = match resp["status"].as_str().unwrap_or("") {
            "captured" => ProviderStatus::Captured,
            "failed" => ProviderStatus::Failed,
            _ => ProviderStatus::Pending,
        };

        Ok(ResolveResult {
            provider_status,
            is_verified: provider_status == ProviderStatus::Captured,
            provider_payment_id: Some(provider_payment_id.clone()),
        })
    }

    /// Razorpay has no order-level cancel endpoint, so this walks the
    /// order's payment attempts and voids each one: a zero-capture for an
    /// `authorized` payment, a full refund for one already `captured`
    /// (spec §4.3). Remote failure degrades to `success: false`, matching
    /// `StripeAdapter::cancel`; the caller still finishes the local
    /// `PENDING -> CANCELLED` transition regardless.
    async fn cancel(
        &self,
        provider_order_id: &ProviderOrderId,
        reason: Option<&str>,
    ) -> Result<CancelResult, ServiceError> {
        let payments = match self.list_order_payments(provider_order_id).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "razorpay cancel: listing order payments failed");
                return Ok(CancelResult { success: false });
            }
        };

        let mut all_ok = true;
        for payment in &payments {
            let Some(payment_id) = payment["id"].as_str() else {
                continue;
            };
            let outcome = match payment["status"].as_str().unwrap_or("") {
                "authorized" => self.void_authorized_payment(payment_id).await,
                "captured" => self.refund_captured_payment(payment_id, reason).await,
                _ => Ok(()),
            };
            if let Err(e) = outcome {
                tracing::warn!(error = %e, payment_id, "razorpay cancel: void/refund failed");
                all_ok = false;
            }
        }

        Ok(CancelResult { success: all_ok })
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundResult, ServiceError> {
        let body = serde_json::json!({
            "amount": request.amount.amount().minor_units(),
        });

        let resp: serde_json::Value = self
            .http
            .post(format!(
                "{}/v1/payments/{}/refund",
                self.base_url,
                request.provider_order_id.as_str()
            ))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .header("X-Razorpay-Idempotency-Key", &request.idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Provider(format!("razorpay refund: {e}")))?
            .json()
            .await
            .map_err(|e| ServiceError::Provider(format!("razorpay refund decode: {e}")))?;

        let status = match resp["status"].as_str().unwrap_or("") {
            "processed" => RefundStatus::Success,
            "failed" => RefundStatus::Failed,
            _ => RefundStatus::Pending,
        };

        Ok(RefundResult {
            provider_refund_id: resp["id"].as_str().unwrap_or_default().to_string(),
            status,
        })
    }

    async fn is_available(&self) -> bool {
        self.http
            .get(format!("{}/v1/orders?count=1", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_when_computed_with_same_secret() {
        let mut mac = HmacSha256::new_from_slice(b"whsec_test").unwrap();
        mac.update(b"order_1|pay_1");
        let sig = hex::encode(mac.finalize().into_bytes());

        assert!(RazorpayAdapter::verify_payment_signature("whsec_test", "order_1", "pay_1", &sig).is_ok());
    }

    #[test]
    fn signature_rejected_with_wrong_secret() {
        let mut mac = HmacSha256::new_from_slice(b"whsec_test").unwrap();
        mac.update(b"order_1|pay_1");
        let sig = hex::encode(mac.finalize().into_bytes());

        assert!(RazorpayAdapter::verify_payment_signature("whsec_other", "order_1", "pay_1", &sig).is_err());
    }

    #[test]
    fn signature_rejected_when_not_hex() {
        assert!(RazorpayAdapter::verify_payment_signature("whsec_test", "order_1", "pay_1", "not-hex").is_err());
    }
}
