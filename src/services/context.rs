//! The use-case orchestration layer's dependency bundle. Constructed once in
//! `main` and passed by reference into every use case — no global statics
//! (spec §9 "Global state: none required").

use {
    crate::ports::{
        audit::AuditStore, bus::BusProducer, cache::Cache, course::CoursePort,
        exchange::ExchangePort, order::OrderPort, store::PaymentStore,
    },
    crate::domain::{error::ServiceError, provider::{Provider, ProviderAdapter}},
    crate::infra::postgres::PgProcessedEventsRepo,
    crate::webhooks::{signature::PaypalCertVerifier, WebhookSecrets},
    std::{collections::HashMap, sync::Arc},
};

#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn PaymentStore>,
    pub cache: Arc<dyn Cache>,
    pub bus: Arc<dyn BusProducer>,
    pub audit: Arc<dyn AuditStore>,
    pub order: Arc<dyn OrderPort>,
    pub course: Arc<dyn CoursePort>,
    pub exchange: Arc<dyn ExchangePort>,
    pub providers: HashMap<Provider, Arc<dyn ProviderAdapter>>,
    pub webhook_secrets: WebhookSecrets,
    pub paypal_cert_verifier: Arc<PaypalCertVerifier>,
    pub processed_events: Arc<PgProcessedEventsRepo>,
}

impl ServiceContext {
    pub fn adapter(&self, provider: Provider) -> Result<&Arc<dyn ProviderAdapter>, ServiceError> {
        self.providers
            .get(&provider)
            .ok_or_else(|| ServiceError::Validation(format!("no adapter configured for {provider}")))
    }
}
