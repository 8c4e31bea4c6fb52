//! `ExchangePort` against a public FX provider (spec §6 "e.g. Frankfurter"),
//! with a 60s in-process cache TTL and a stale-on-failure fallback: if the
//! upstream call fails and a previous rate is cached for this pair, that
//! stale rate is returned rather than failing `CreatePayment` outright.

use {
    crate::domain::{error::ServiceError, money::Currency},
    crate::ports::exchange::{ExchangePort, ExchangeRate},
    async_trait::async_trait,
    chrono::Utc,
    rust_decimal::Decimal,
    std::{collections::HashMap, sync::Mutex, time::Duration},
};

const CACHE_TTL: Duration = Duration::from_secs(60);

pub struct FrankfurterExchangeClient {
    http: reqwest::Client,
    base_url: String,
    cache: Mutex<HashMap<(Currency, Currency), ExchangeRate>>,
}

impl FrankfurterExchangeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, base: Currency, target: Currency) -> Option<ExchangeRate> {
        let guard = self.cache.lock().unwrap();
        guard.get(&(base, target)).copied().filter(|rate| {
            Utc::now().signed_duration_since(rate.timestamp).num_seconds()
                < CACHE_TTL.as_secs() as i64
        })
    }

    fn stale(&self, base: Currency, target: Currency) -> Option<ExchangeRate> {
        self.cache.lock().unwrap().get(&(base, target)).copied()
    }

    fn store(&self, base: Currency, target: Currency, rate: ExchangeRate) {
        self.cache.lock().unwrap().insert((base, target), rate);
    }

    async fn fetch(&self, base: Currency, target: Currency) -> Result<ExchangeRate, ServiceError> {
        let resp: serde_json::Value = self
            .http
            .get(format!("{}/latest", self.base_url))
            .query(&[("from", base.as_str()), ("to", target.as_str())])
            .send()
            .await
            .map_err(|e| ServiceError::CurrencyConversion(format!("fx fetch: {e}")))?
            .error_for_status()
            .map_err(|e| ServiceError::CurrencyConversion(format!("fx fetch: {e}")))?
            .json()
            .await
            .map_err(|e| ServiceError::CurrencyConversion(format!("fx decode: {e}")))?;

        let rate = resp["rates"][target.as_str()]
            .as_f64()
            .ok_or_else(|| ServiceError::CurrencyConversion("fx response missing rate".into()))?;

        Ok(ExchangeRate {
            rate: Decimal::try_from(rate)
                .map_err(|e| ServiceError::CurrencyConversion(format!("fx rate decode: {e}")))?,
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl ExchangePort for FrankfurterExchangeClient {
    async fn get_rate(&self, base: Currency, target: Currency) -> Result<ExchangeRate, ServiceError> {
        if base == target {
            return Ok(ExchangeRate {
                rate: Decimal::ONE,
                timestamp: Utc::now(),
            });
        }

        if let Some(rate) = self.cached(base, target) {
            return Ok(rate);
        }

        match self.fetch(base, target).await {
            Ok(rate) => {
                self.store(base, target, rate);
                Ok(rate)
            }
            Err(err) => self
                .stale(base, target)
                .ok_or(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    // spec §8 boundary: USD=USD has rate 1 exactly, no conversion path entered.
    #[tokio::test]
    async fn same_currency_is_identity_rate_without_a_network_call() {
        let server = MockServer::start().await;
        let client = FrankfurterExchangeClient::new(server.uri());

        let rate = client.get_rate(Currency::Usd, Currency::Usd).await.unwrap();
        assert_eq!(rate.rate, Decimal::ONE);
    }

    #[tokio::test]
    async fn fetches_and_caches_the_rate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .and(query_param("from", "EUR"))
            .and(query_param("to", "USD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "amount": 1.0,
                "base": "EUR",
                "date": "2024-01-15",
                "rates": { "USD": 1.08 },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = FrankfurterExchangeClient::new(server.uri());
        let first = client.get_rate(Currency::Eur, Currency::Usd).await.unwrap();
        assert_eq!(first.rate, Decimal::try_from(1.08).unwrap());

        // Second call within the 60s TTL must not hit the network again
        // (the mock's `.expect(1)` fails the test on a second request).
        let second = client.get_rate(Currency::Eur, Currency::Usd).await.unwrap();
        assert_eq!(second.rate, first.rate);
    }

    #[tokio::test]
    async fn stale_rate_is_returned_when_upstream_fails() {
        let server = MockServer::start().await;

        // First response succeeds and seeds the cache directly (bypassing
        // the 60s freshness window isn't possible from here, so we drive
        // the stale-fallback path by having upstream fail on the very next
        // call after a manually inserted stale entry).
        let client = FrankfurterExchangeClient::new(server.uri());
        client.store(
            Currency::Gbp,
            Currency::Usd,
            ExchangeRate {
                rate: Decimal::try_from(1.25).unwrap(),
                timestamp: Utc::now() - chrono::Duration::seconds(120),
            },
        );

        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let rate = client.get_rate(Currency::Gbp, Currency::Usd).await.unwrap();
        assert_eq!(rate.rate, Decimal::try_from(1.25).unwrap());
    }

    #[tokio::test]
    async fn failure_with_no_stale_rate_surfaces_currency_conversion_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = FrankfurterExchangeClient::new(server.uri());
        let err = client.get_rate(Currency::Jpy, Currency::Usd).await.unwrap_err();
        assert!(matches!(err, ServiceError::CurrencyConversion(_)));
    }
}
