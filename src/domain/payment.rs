use {
    super::error::ServiceError,
    super::id::{IdempotencyKey, PaymentId, ProviderOrderId, ProviderSessionId},
    super::money::Money,
    super::provider::Provider,
    chrono::{DateTime, Duration, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Default lifetime of a freshly created payment (spec §4.4 step 5).
pub const DEFAULT_EXPIRY: Duration = Duration::minutes(10);

/// Payment lifecycle states (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Resolved,
    Success,
    Failed,
    Cancelled,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Terminal states permit no further transition (spec §3/§4.1).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled | Self::Expired)
    }

    /// The exhaustive transition table (spec §4.1). Centralized here rather
    /// than scattered across use cases, per spec §9 "Status transitions".
    fn outcome_of(&self, to: Self) -> TransitionOutcome {
        use PaymentStatus::*;
        match (*self, to) {
            (Pending, Resolved)
            | (Pending, Success)
            | (Pending, Failed)
            | (Pending, Cancelled)
            | (Pending, Expired)
            | (Resolved, Success) => TransitionOutcome::Allowed,

            // Idempotent no-ops: a repeat success/failure on an
            // already-terminal payment returns OK without re-publishing.
            (Success, Success) | (Failed, Failed) => TransitionOutcome::NoOp,

            _ => TransitionOutcome::Forbidden,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = ServiceError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(ServiceError::Validation(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

/// Result of attempting `Payment::transition_to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The transition is valid and was applied; `updated_at` was stamped.
    Allowed,
    /// The payment was already in the target terminal state; nothing
    /// changed, no event should be published.
    NoOp,
    /// The edge is not in the transition table.
    Forbidden,
}

/// Session status for one provider attempt (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderSessionStatus {
    Created,
    PendingApproval,
    Approved,
    Captured,
    Failed,
}

impl ProviderSessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Captured => "captured",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ProviderSessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ProviderSessionStatus {
    type Error = ServiceError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "created" => Ok(Self::Created),
            "pending_approval" => Ok(Self::PendingApproval),
            "approved" => Ok(Self::Approved),
            "captured" => Ok(Self::Captured),
            "failed" => Ok(Self::Failed),
            other => Err(ServiceError::Validation(format!(
                "unknown provider session status: {other}"
            ))),
        }
    }
}

/// One attempt at charging a payment through a named provider (spec §3).
/// Append-only within a `Payment`: sessions are never deleted, and are
/// value types (no cyclic back-pointer to the owning `Payment`, per spec §9
/// "Aggregate mutation").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSession {
    pub id: ProviderSessionId,
    pub payment_id: PaymentId,
    pub provider: Provider,
    pub provider_order_id: ProviderOrderId,
    pub provider_payment_id: Option<String>,
    /// Amount/currency as presented to the provider — may differ from the
    /// payment's original currency (FX conversion, spec §3).
    pub amount: Money,
    pub fx_rate: Option<rust_decimal::Decimal>,
    pub fx_timestamp: Option<DateTime<Utc>>,
    pub status: ProviderSessionStatus,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProviderSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        payment_id: PaymentId,
        provider: Provider,
        provider_order_id: ProviderOrderId,
        amount: Money,
        fx_rate: Option<rust_decimal::Decimal>,
        fx_timestamp: Option<DateTime<Utc>>,
        metadata: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ProviderSessionId::new(),
            payment_id,
            provider,
            provider_order_id,
            provider_payment_id: None,
            amount,
            fx_rate,
            fx_timestamp,
            status: ProviderSessionStatus::Created,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Any session may be marked `FAILED` (spec §4.1).
    pub fn mark_failed(&mut self) {
        self.status = ProviderSessionStatus::Failed;
        self.updated_at = Utc::now();
    }

    /// Successful resolve/capture settles the session, recording the
    /// provider's own payment id when present (spec §9 open question:
    /// success sets `CAPTURED`, never `FAILED`).
    pub fn mark_captured(&mut self, provider_payment_id: Option<String>) {
        self.status = ProviderSessionStatus::Captured;
        if provider_payment_id.is_some() {
            self.provider_payment_id = provider_payment_id;
        }
        self.updated_at = Utc::now();
    }

    pub fn mark_approved(&mut self) {
        self.status = ProviderSessionStatus::Approved;
        self.updated_at = Utc::now();
    }
}

/// The `Payment` aggregate root (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: String,
    pub order_id: String,
    pub original_amount: Money,
    pub idempotency_key: IdempotencyKey,
    pub status: PaymentStatus,
    pub provider_order_id: Option<ProviderOrderId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Convenience in-memory view; persistence writes payment + sessions
    /// atomically, sessions are not owned in the OOP sense (spec §9).
    pub sessions: Vec<ProviderSession>,
}

impl Payment {
    pub fn new(
        user_id: impl Into<String>,
        order_id: impl Into<String>,
        original_amount: Money,
        idempotency_key: IdempotencyKey,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            user_id: user_id.into(),
            order_id: order_id.into(),
            original_amount,
            idempotency_key,
            status: PaymentStatus::Pending,
            provider_order_id: None,
            created_at: now,
            updated_at: now,
            expires_at: now + DEFAULT_EXPIRY,
            sessions: Vec::new(),
        }
    }

    /// Applies the lifecycle transition table (spec §4.1). Returns the
    /// outcome so callers know whether to publish an event.
    pub fn transition_to(&mut self, to: PaymentStatus) -> Result<TransitionOutcome, ServiceError> {
        match self.status.outcome_of(to) {
            TransitionOutcome::Allowed => {
                self.status = to;
                self.updated_at = Utc::now();
                Ok(TransitionOutcome::Allowed)
            }
            TransitionOutcome::NoOp => Ok(TransitionOutcome::NoOp),
            TransitionOutcome::Forbidden => Err(ServiceError::InvalidTransition(format!(
                "{} -> {}",
                self.status, to
            ))),
        }
    }

    /// Invariant: at most one session may be `CAPTURED` (spec §3).
    pub fn captured_session_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.status == ProviderSessionStatus::Captured)
            .count()
    }

    pub fn find_session_mut(&mut self, provider_order_id: &ProviderOrderId) -> Option<&mut ProviderSession> {
        self.sessions
            .iter_mut()
            .find(|s| &s.provider_order_id == provider_order_id)
    }

    pub fn append_session(&mut self, session: ProviderSession) {
        self.sessions.push(session);
    }

    /// Basic construction-time invariants (spec §3): positive amount and
    /// `expiresAt > createdAt` are enforced by `MoneyAmount`/`DEFAULT_EXPIRY`
    /// respectively; this checks the capture cardinality invariant after a
    /// mutation.
    pub fn check_invariants(&self) -> Result<(), ServiceError> {
        if self.captured_session_count() > 1 {
            return Err(ServiceError::InternalUnknown(format!(
                "payment {} has more than one captured session",
                self.id
            )));
        }
        if self.expires_at <= self.created_at {
            return Err(ServiceError::InternalUnknown(format!(
                "payment {} has expires_at <= created_at",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_reach_every_forward_edge() {
        use PaymentStatus::*;
        for target in [Resolved, Success, Failed, Cancelled, Expired] {
            assert_eq!(Pending.outcome_of(target), TransitionOutcome::Allowed);
        }
    }

    #[test]
    fn resolved_can_only_reach_success() {
        use PaymentStatus::*;
        assert_eq!(Resolved.outcome_of(Success), TransitionOutcome::Allowed);
        for target in [Pending, Resolved, Failed, Cancelled, Expired] {
            assert_eq!(Resolved.outcome_of(target), TransitionOutcome::Forbidden);
        }
    }

    #[test]
    fn terminal_states_reject_everything_except_documented_noop() {
        use PaymentStatus::*;
        for terminal in [Success, Failed, Cancelled, Expired] {
            for target in [Pending, Resolved, Success, Failed, Cancelled, Expired] {
                let outcome = terminal.outcome_of(target);
                if terminal == Success && target == Success {
                    assert_eq!(outcome, TransitionOutcome::NoOp);
                } else if terminal == Failed && target == Failed {
                    assert_eq!(outcome, TransitionOutcome::NoOp);
                } else {
                    assert_eq!(
                        outcome,
                        TransitionOutcome::Forbidden,
                        "{terminal} -> {target} should be forbidden"
                    );
                }
            }
        }
    }

    #[test]
    fn status_str_roundtrip() {
        for s in [
            PaymentStatus::Pending,
            PaymentStatus::Resolved,
            PaymentStatus::Success,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
            PaymentStatus::Expired,
        ] {
            assert_eq!(PaymentStatus::try_from(s.as_str()).unwrap(), s);
        }
    }

    #[test]
    fn new_payment_defaults() {
        use crate::domain::money::{Currency, MoneyAmount};

        let key = IdempotencyKey::new(uuid::Uuid::now_v7());
        let payment = Payment::new(
            "user-1",
            "order-1",
            Money::new(MoneyAmount::new(5000).unwrap(), Currency::Usd),
            key,
        );
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.expires_at > payment.created_at);
        assert!(payment.sessions.is_empty());
        assert!(payment.check_invariants().is_ok());
    }
}
