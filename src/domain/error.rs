use thiserror::Error;

/// Error taxonomy for the payment-orchestration core (spec §7).
///
/// Kinds, not names: every variant here maps to exactly one stable RPC
/// error code at the transport boundary (`transport::rpc::error_code`).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("invalid order state: {0}")]
    InvalidOrderState(String),

    #[error("amount mismatch: {0}")]
    AmountMismatch(String),

    #[error("provider cancel failed: {0}")]
    ProviderCancelFailed(String),

    #[error("deadline exceeded: {0}")]
    Timeout(String),

    #[error("operation already in progress for this idempotency key")]
    InProgress,

    #[error("idempotency key required for this operation")]
    MissingIdempotencyKey,

    #[error("currency conversion failed: {0}")]
    CurrencyConversion(String),

    #[error("webhook signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache: {0}")]
    Cache(String),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    InternalUnknown(String),
}

impl ServiceError {
    /// Stable RPC error code per spec §7's propagation policy.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidTransition(_) => "FAILED_PRECONDITION",
            Self::InvalidOrderState(_) => "FAILED_PRECONDITION",
            Self::AmountMismatch(_) => "ABORTED",
            Self::ProviderCancelFailed(_) => "ABORTED",
            Self::Timeout(_) => "DEADLINE_EXCEEDED",
            Self::InProgress => "ALREADY_EXISTS",
            Self::MissingIdempotencyKey => "INVALID_ARGUMENT",
            Self::CurrencyConversion(_) => "ABORTED",
            Self::SignatureInvalid(_) => "INVALID_ARGUMENT",
            Self::Validation(_) => "INVALID_ARGUMENT",
            Self::Provider(_) => "INTERNAL",
            Self::Database(_) => "INTERNAL",
            Self::Cache(_) => "INTERNAL",
            Self::Serialization(_) => "INTERNAL",
            Self::InternalUnknown(_) => "INTERNAL",
        }
    }

    /// `true` when a caller may legitimately retry the same idempotency key.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::InProgress)
    }

    /// Sub-error strings for the RPC error envelope's `details[]` (spec §6).
    /// Most kinds carry everything in `message`; `AmountMismatch` and
    /// `Validation` can enumerate the specific reconciliation failure as a
    /// standalone detail entry for callers that only display `details[]`.
    pub fn details(&self) -> Vec<String> {
        match self {
            Self::AmountMismatch(detail) | Self::Validation(detail) => vec![detail.clone()],
            _ => Vec::new(),
        }
    }
}
