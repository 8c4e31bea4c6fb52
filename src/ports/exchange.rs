use {
    crate::domain::{error::ServiceError, money::Currency},
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    rust_decimal::Decimal,
};

#[derive(Debug, Clone, Copy)]
pub struct ExchangeRate {
    pub rate: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// FX rate port (spec §6 `Exchange.GetRate`). The concrete adapter fetches
/// from a public provider with a 60s cache TTL and a stale-on-failure
/// fallback (spec §6); `CreatePayment` fails with `CurrencyConversion` if
/// the port errors and no stale rate is available (spec §4.4 step 3, §7).
#[async_trait]
pub trait ExchangePort: Send + Sync {
    async fn get_rate(&self, base: Currency, target: Currency) -> Result<ExchangeRate, ServiceError>;
}
