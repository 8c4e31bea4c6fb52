//! Webhook signature verification for all three providers (spec §4.5 step 2).
//! Ingress handlers call these before anything else touches the body; a
//! failure here must never reach the domain layer as anything other than
//! `ServiceError::SignatureInvalid`.

use {
    crate::domain::error::ServiceError,
    hmac::{Hmac, Mac},
    rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey},
    sha2::{Digest, Sha256},
    std::{
        collections::HashMap,
        sync::Mutex,
        time::{Duration, Instant},
    },
    subtle::ConstantTimeEq,
};

type HmacSha256 = Hmac<Sha256>;

/// Delegates to the SDK's own constant-time HMAC check (spec §4.3/§4.5).
pub fn verify_stripe(
    body: &str,
    signature_header: &str,
    webhook_secret: &str,
) -> Result<stripe::Event, ServiceError> {
    stripe::Webhook::construct_event(body, signature_header, webhook_secret)
        .map_err(|e| ServiceError::SignatureInvalid(e.to_string()))
}

/// Razorpay webhooks carry `HMAC_SHA256(webhook_secret, raw_body)` hex in the
/// `X-Razorpay-Signature` header. Distinct from the client-resolve signature
/// verified in `adapters::razorpay`, which signs `orderId|paymentId` rather
/// than the whole body.
pub fn verify_razorpay(
    body: &[u8],
    signature_hex: &str,
    webhook_secret: &str,
) -> Result<(), ServiceError> {
    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
        .map_err(|e| ServiceError::SignatureInvalid(format!("bad hmac key: {e}")))?;
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    let signature_bytes = hex::decode(signature_hex)
        .map_err(|_| ServiceError::SignatureInvalid("signature is not valid hex".into()))?;
    let expected_bytes =
        hex::decode(&expected).expect("hex::encode output is always valid hex");

    if signature_bytes.ct_eq(&expected_bytes).unwrap_u8() == 1 {
        Ok(())
    } else {
        Err(ServiceError::SignatureInvalid(
            "razorpay webhook signature mismatch".into(),
        ))
    }
}

/// The five `PAYPAL-*` headers PayPal's cert-chain scheme signs over
/// (spec §4.5).
pub struct PaypalWebhookHeaders<'a> {
    pub transmission_id: &'a str,
    pub transmission_time: &'a str,
    pub cert_url: &'a str,
    pub auth_algo: &'a str,
    pub transmission_sig: &'a str,
}

struct CachedCert {
    key: RsaPublicKey,
    fetched_at: Instant,
}

const CERT_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Fetches and caches the RSA public key behind a PayPal `cert-url` for 12
/// hours (spec §4.5). PayPal signs `"{transmissionId}|{transmissionTime}|
/// {webhookId}|{sha256(body)}"` with PKCS#1 v1.5 over SHA-256, base64-encoded
/// in `Paypal-Transmission-Sig`.
pub struct PaypalCertVerifier {
    http: reqwest::Client,
    webhook_id: String,
    cache: Mutex<HashMap<String, CachedCert>>,
}

impl PaypalCertVerifier {
    pub fn new(webhook_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_id: webhook_id.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn verify(
        &self,
        headers: &PaypalWebhookHeaders<'_>,
        body: &[u8],
    ) -> Result<(), ServiceError> {
        if !headers.auth_algo.eq_ignore_ascii_case("SHA256withRSA") {
            return Err(ServiceError::SignatureInvalid(format!(
                "unsupported paypal auth algo: {}",
                headers.auth_algo
            )));
        }

        let public_key = self.cert_for(headers.cert_url).await?;

        let body_digest = hex::encode(Sha256::digest(body));
        let message = format!(
            "{}|{}|{}|{}",
            headers.transmission_id, headers.transmission_time, self.webhook_id, body_digest
        );

        let signature = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            headers.transmission_sig,
        )
        .map_err(|_| ServiceError::SignatureInvalid("transmission-sig is not valid base64".into()))?;

        let hashed = Sha256::digest(message.as_bytes());
        public_key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, &signature)
            .map_err(|_| ServiceError::SignatureInvalid("paypal signature mismatch".into()))
    }

    async fn cert_for(&self, cert_url: &str) -> Result<RsaPublicKey, ServiceError> {
        let cache_key = hex::encode(Sha256::digest(cert_url.as_bytes()));

        if let Some(cached) = self.cache.lock().expect("cert cache lock poisoned").get(&cache_key) {
            if cached.fetched_at.elapsed() < CERT_TTL {
                return Ok(cached.key.clone());
            }
        }

        let pem_body = self
            .http
            .get(cert_url)
            .send()
            .await
            .map_err(|e| ServiceError::SignatureInvalid(format!("fetching paypal cert: {e}")))?
            .text()
            .await
            .map_err(|e| ServiceError::SignatureInvalid(format!("reading paypal cert: {e}")))?;

        let key = parse_rsa_public_key(&pem_body)?;

        self.cache.lock().expect("cert cache lock poisoned").insert(
            cache_key,
            CachedCert {
                key: key.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok(key)
    }
}

fn parse_rsa_public_key(pem_text: &str) -> Result<RsaPublicKey, ServiceError> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(pem_text.as_bytes())
        .map_err(|e| ServiceError::SignatureInvalid(format!("invalid paypal cert pem: {e}")))?;
    let cert = pem
        .parse_x509()
        .map_err(|e| ServiceError::SignatureInvalid(format!("invalid paypal cert der: {e}")))?;

    let parsed_key = cert
        .public_key()
        .parsed()
        .map_err(|e| ServiceError::SignatureInvalid(format!("invalid paypal cert spki: {e}")))?;

    let rsa_key = match parsed_key {
        x509_parser::public_key::PublicKey::RSA(rsa) => rsa,
        _ => {
            return Err(ServiceError::SignatureInvalid(
                "paypal cert does not carry an rsa key".into(),
            ));
        }
    };

    RsaPublicKey::new(
        BigUint::from_bytes_be(rsa_key.modulus),
        BigUint::from_bytes_be(rsa_key.exponent),
    )
    .map_err(|e| ServiceError::SignatureInvalid(format!("invalid rsa key material: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn razorpay_signature_matches_when_computed_with_same_secret() {
        let mut mac = HmacSha256::new_from_slice(b"whsec_test").unwrap();
        mac.update(b"{\"event\":\"payment.captured\"}");
        let sig = hex::encode(mac.finalize().into_bytes());

        assert!(verify_razorpay(
            b"{\"event\":\"payment.captured\"}",
            &sig,
            "whsec_test"
        )
        .is_ok());
    }

    #[test]
    fn razorpay_signature_rejected_with_wrong_secret() {
        let mut mac = HmacSha256::new_from_slice(b"whsec_test").unwrap();
        mac.update(b"body");
        let sig = hex::encode(mac.finalize().into_bytes());

        assert!(verify_razorpay(b"body", &sig, "whsec_other").is_err());
    }
}
