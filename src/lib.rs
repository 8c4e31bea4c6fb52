pub mod adapters;
pub mod config;
pub mod domain;
pub mod idempotency;
pub mod infra;
pub mod ports;
pub mod services;
pub mod timeout;
pub mod transport;
pub mod webhooks;
