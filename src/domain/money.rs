use {
    super::error::ServiceError,
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// A non-negative integer amount in the smallest indivisible unit of its
/// currency (cents for USD, paise for INR — spec §9 "amount units").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MoneyAmount(i64);

impl MoneyAmount {
    /// Payments require a strictly positive amount (spec §3 invariant).
    pub fn new(minor_units: i64) -> Result<Self, ServiceError> {
        if minor_units <= 0 {
            return Err(ServiceError::Validation(format!(
                "amount must be positive, got: {minor_units}"
            )));
        }
        Ok(Self(minor_units))
    }

    /// Zero is only meaningful as an accumulator, never as a charged amount.
    pub fn zero() -> Self {
        Self(0)
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }

    pub fn checked_add(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0.checked_add(other.0).map(MoneyAmount)
    }

    /// Absolute difference, used by the ±1 minor-unit tolerance checks in
    /// `CreatePayment` (spec §4.4 steps 4 and 7).
    pub fn abs_diff(self, other: MoneyAmount) -> i64 {
        (self.0 - other.0).abs()
    }
}

impl fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO-4217 currencies the service's providers collectively support (spec
/// §4.3 `supportedCurrencies`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
    Jpy,
    Inr,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Cad => "CAD",
            Self::Aud => "AUD",
            Self::Jpy => "JPY",
            Self::Inr => "INR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Currency {
    type Error = ServiceError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            "CAD" => Ok(Self::Cad),
            "AUD" => Ok(Self::Aud),
            "JPY" => Ok(Self::Jpy),
            "INR" => Ok(Self::Inr),
            other => Err(ServiceError::Validation(format!(
                "unknown currency: {other}"
            ))),
        }
    }
}

/// A minor-unit amount paired with its currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: MoneyAmount,
    currency: Currency,
}

impl Money {
    pub fn new(amount: MoneyAmount, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn amount(&self) -> MoneyAmount {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Converts a minor-unit amount across currencies given a base→target FX
/// rate, per spec §4.4 step 3: `round(amountSub/100 × rate × 100)`
/// (minor → major → minor). Uses `rust_decimal` so repeated conversions
/// don't accumulate floating-point drift.
pub fn convert_minor_units(amount: MoneyAmount, rate: rust_decimal::Decimal) -> MoneyAmount {
    use rust_decimal::Decimal;

    let major = Decimal::from(amount.minor_units()) / Decimal::from(100);
    let converted_major = major * rate;
    let converted_minor = (converted_major * Decimal::from(100)).round();
    MoneyAmount(
        converted_minor
            .try_into()
            .expect("FX-converted amount overflowed i64 minor units"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn amount_zero_rejected() {
        assert!(MoneyAmount::new(0).is_err());
    }

    #[test]
    fn amount_one_accepted() {
        assert!(MoneyAmount::new(1).is_ok());
    }

    #[test]
    fn amount_negative_rejected() {
        assert!(MoneyAmount::new(-1).is_err());
    }

    #[test]
    fn currency_roundtrip() {
        for c in [
            Currency::Usd,
            Currency::Eur,
            Currency::Gbp,
            Currency::Cad,
            Currency::Aud,
            Currency::Jpy,
            Currency::Inr,
        ] {
            assert_eq!(Currency::try_from(c.as_str()).unwrap(), c);
        }
    }

    #[test]
    fn currency_unknown_is_err() {
        assert!(Currency::try_from("XYZ").is_err());
    }

    #[test]
    fn usd_to_usd_is_identity_rate_one() {
        let amount = MoneyAmount::new(5000).unwrap();
        let converted = convert_minor_units(amount, Decimal::ONE);
        assert_eq!(converted.minor_units(), 5000);
    }

    #[test]
    fn eur_to_usd_matches_spec_example() {
        // spec §8 scenario 6: 10000 EUR minor units, rate 1.08 -> 10800 USD minor units.
        let amount = MoneyAmount::new(10000).unwrap();
        let rate = Decimal::from_str("1.08").unwrap();
        let converted = convert_minor_units(amount, rate);
        assert_eq!(converted.minor_units(), 10800);
    }
}
