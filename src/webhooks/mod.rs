pub mod consumer;
pub mod ingress;
pub mod normalize;
pub mod signature;

/// Per-provider webhook secrets (spec §4.5). Plain config data — unlike
/// `PaypalCertVerifier`, nothing here is stateful, so it lives as a plain
/// struct rather than behind a port.
#[derive(Clone)]
pub struct WebhookSecrets {
    pub stripe_webhook_secret: String,
    pub razorpay_webhook_secret: String,
}
