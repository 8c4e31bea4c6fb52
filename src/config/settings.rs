//! Process configuration, loaded once in `main` from the environment
//! (`.env` via `dotenvy`). No global statics — the resulting `Settings` is
//! folded into `ServiceContext` and handed to every use case by reference
//! (spec §9 "Global state: none required").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub redis_url: String,

    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,

    pub paypal_base_url: String,
    pub paypal_client_id: String,
    pub paypal_client_secret: String,
    pub paypal_webhook_id: String,

    pub razorpay_base_url: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_webhook_secret: String,

    pub order_service_base_url: String,
    pub course_service_base_url: String,
    pub exchange_service_base_url: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000"),
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,

            stripe_secret_key: require_env("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: require_env("STRIPE_WEBHOOK_SECRET")?,

            paypal_base_url: env_or("PAYPAL_BASE_URL", "https://api-m.paypal.com"),
            paypal_client_id: require_env("PAYPAL_CLIENT_ID")?,
            paypal_client_secret: require_env("PAYPAL_CLIENT_SECRET")?,
            paypal_webhook_id: require_env("PAYPAL_WEBHOOK_ID")?,

            razorpay_base_url: env_or("RAZORPAY_BASE_URL", "https://api.razorpay.com"),
            razorpay_key_id: require_env("RAZORPAY_KEY_ID")?,
            razorpay_key_secret: require_env("RAZORPAY_KEY_SECRET")?,
            razorpay_webhook_secret: require_env("RAZORPAY_WEBHOOK_SECRET")?,

            order_service_base_url: require_env("ORDER_SERVICE_BASE_URL")?,
            course_service_base_url: require_env("COURSE_SERVICE_BASE_URL")?,
            exchange_service_base_url: env_or(
                "EXCHANGE_SERVICE_BASE_URL",
                "https://api.frankfurter.app",
            ),
        })
    }
}

fn env_or(name: &'static str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}
