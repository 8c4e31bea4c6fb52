use {
    super::error::ServiceError,
    super::id::{ProviderOrderId, ProviderPaymentId},
    super::money::{Currency, Money},
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// The three provider variants the lifecycle model is polymorphic over
/// (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provider {
    Stripe,
    Paypal,
    Razorpay,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stripe => "STRIPE",
            Self::Paypal => "PAYPAL",
            Self::Razorpay => "RAZORPAY",
        }
    }

    /// Currency table from spec §4.3.
    pub fn supported_currencies(&self) -> &'static [Currency] {
        match self {
            Self::Stripe | Self::Paypal => &[
                Currency::Usd,
                Currency::Eur,
                Currency::Gbp,
                Currency::Cad,
                Currency::Aud,
                Currency::Jpy,
            ],
            Self::Razorpay => &[Currency::Inr, Currency::Usd],
        }
    }

    pub fn is_currency_supported(&self, currency: Currency) -> bool {
        self.supported_currencies().contains(&currency)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Provider {
    type Error = ServiceError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_uppercase().as_str() {
            "STRIPE" => Ok(Self::Stripe),
            "PAYPAL" => Ok(Self::Paypal),
            "RAZORPAY" => Ok(Self::Razorpay),
            other => Err(ServiceError::Validation(format!(
                "unknown provider: {other}"
            ))),
        }
    }
}

/// A single checkout line item, priced in the currency actually presented
/// to the provider (post-conversion, spec §4.3/§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    pub unit_amount: Money,
    pub image_url: Option<String>,
}

/// Uniform request shape for `createSession` (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: String,
    pub amount: Money,
    pub idempotency_key: String,
    pub order_id: String,
    pub line_items: Vec<LineItem>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
    pub description: Option<String>,
    pub customer_email: Option<String>,
}

/// Provider-specific completion data, returned alongside the common
/// `ProviderSessionResult` fields (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "UPPERCASE")]
pub enum ProviderSessionDetails {
    Stripe {
        client_secret: String,
        hosted_url: String,
    },
    Paypal {
        approval_url: String,
    },
    Razorpay {
        key_id: String,
    },
}

/// What `createSession` returns: the provider order id, the amount/currency
/// actually charged, and a provider-tagged variant carrying completion data
/// plus opaque metadata. A small tagged union rather than a class hierarchy
/// (spec §9 "Polymorphism across providers").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSessionResult {
    pub provider_order_id: ProviderOrderId,
    pub charged_amount: Money,
    pub details: ProviderSessionDetails,
    pub metadata: serde_json::Value,
}

/// Provider-specific payload driving a client-initiated resolve (spec
/// §4.3/§4.4: PayPal capture, Razorpay signature check, Stripe session
/// lookup).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "UPPERCASE")]
pub enum ResolveRequest {
    Stripe {
        provider_order_id: ProviderOrderId,
    },
    Paypal {
        provider_order_id: ProviderOrderId,
    },
    Razorpay {
        provider_order_id: ProviderOrderId,
        provider_payment_id: ProviderPaymentId,
        /// `HMAC_SHA256(secret, "orderId|paymentId")`, hex-encoded.
        signature: String,
    },
}

impl ResolveRequest {
    pub fn provider_order_id(&self) -> &ProviderOrderId {
        match self {
            Self::Stripe { provider_order_id }
            | Self::Paypal { provider_order_id }
            | Self::Razorpay {
                provider_order_id, ..
            } => provider_order_id,
        }
    }
}

/// Terminal provider-reported status after a resolve call (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderStatus {
    Captured,
    Failed,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResult {
    pub provider_status: ProviderStatus,
    pub is_verified: bool,
    pub provider_payment_id: Option<ProviderPaymentId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResult {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub provider_order_id: ProviderOrderId,
    pub amount: Money,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResult {
    pub provider_refund_id: String,
    pub status: RefundStatus,
}

/// The uniform provider adapter port (spec §4.3). One implementation per
/// variant lives under `adapters::{stripe, paypal, razorpay}`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<ProviderSessionResult, ServiceError>;

    async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResult, ServiceError>;

    async fn cancel(
        &self,
        provider_order_id: &ProviderOrderId,
        reason: Option<&str>,
    ) -> Result<CancelResult, ServiceError>;

    async fn refund(&self, request: &RefundRequest) -> Result<RefundResult, ServiceError>;

    fn supported_currencies(&self) -> &'static [Currency] {
        self.provider().supported_currencies()
    }

    fn is_currency_supported(&self, currency: Currency) -> bool {
        self.provider().is_currency_supported(currency)
    }

    async fn is_available(&self) -> bool;
}
