//! Binary entrypoint: loads configuration, wires every port to its
//! concrete adapter, and runs the HTTP server alongside the background
//! tasks that keep the lifecycle model converging (spec §4.5, §9 "Global
//! state: none required" — everything here is constructed once and passed
//! down, never reached for through a static).

use {
    payment_orchestrator::{
        adapters::{PaypalAdapter, RazorpayAdapter, StripeAdapter},
        config::Settings,
        domain::provider::{Provider, ProviderAdapter},
        infra::{
            postgres::{PgAuditStore, PgPaymentStore, PgProcessedEventsRepo},
            redis::{RedisCache, RedisExpirySubscriber},
            rpc::{FrankfurterExchangeClient, HttpCourseClient, HttpOrderClient},
            bus::{redis_stream::run_reaper, RedisBus},
        },
        services::context::ServiceContext,
        timeout::{expiry_listener, sweeper},
        transport::http::router,
        webhooks::{consumer as webhook_consumer, signature::PaypalCertVerifier, WebhookSecrets},
    },
    sqlx::postgres::PgPoolOptions,
    std::{collections::HashMap, sync::Arc},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,payment_orchestrator=debug".parse().unwrap()),
        )
        .init();

    let settings = Settings::from_env()?;
    tracing::info!(bind_addr = %settings.bind_addr, "payment-orchestrator starting");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&settings.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let cache = Arc::new(RedisCache::connect(&settings.redis_url).await?);
    let bus = Arc::new(RedisBus::connect(&settings.redis_url, "payment-orchestrator-1").await?);
    for topic in [
        payment_orchestrator::services::topics::PROVIDER_EVENTS,
    ] {
        bus.ensure_group(topic).await?;
    }

    let mut providers: HashMap<Provider, Arc<dyn ProviderAdapter>> = HashMap::new();
    providers.insert(
        Provider::Stripe,
        Arc::new(StripeAdapter::new(&settings.stripe_secret_key)),
    );
    providers.insert(
        Provider::Paypal,
        Arc::new(PaypalAdapter::new(
            settings.paypal_base_url.clone(),
            settings.paypal_client_id.clone(),
            settings.paypal_client_secret.clone(),
        )),
    );
    providers.insert(
        Provider::Razorpay,
        Arc::new(RazorpayAdapter::new(
            settings.razorpay_base_url.clone(),
            settings.razorpay_key_id.clone(),
            settings.razorpay_key_secret.clone(),
        )),
    );

    let processed_events = Arc::new(PgProcessedEventsRepo::new(pool.clone()));

    let ctx = Arc::new(ServiceContext {
        store: Arc::new(PgPaymentStore::new(pool.clone())),
        cache: cache.clone(),
        bus: bus.clone(),
        audit: Arc::new(PgAuditStore::new(pool.clone())),
        order: Arc::new(HttpOrderClient::new(settings.order_service_base_url.clone())),
        course: Arc::new(HttpCourseClient::new(settings.course_service_base_url.clone())),
        exchange: Arc::new(FrankfurterExchangeClient::new(
            settings.exchange_service_base_url.clone(),
        )),
        providers,
        webhook_secrets: WebhookSecrets {
            stripe_webhook_secret: settings.stripe_webhook_secret.clone(),
            razorpay_webhook_secret: settings.razorpay_webhook_secret.clone(),
        },
        paypal_cert_verifier: Arc::new(PaypalCertVerifier::new(settings.paypal_webhook_id.clone())),
        processed_events,
    });

    // Primary timeout path: Redis keyspace-notification subscriber (spec §4.5).
    let expiry_subscriber = Arc::new(RedisExpirySubscriber::connect(&settings.redis_url, 0).await?);
    tokio::spawn(expiry_listener::run(ctx.clone(), expiry_subscriber));

    // Safety-net sweeper (spec §4.5).
    tokio::spawn(sweeper::run(ctx.clone()));

    // Webhook-event consumer, decoupled from the ingress handlers that publish
    // onto the same topic (spec §4.5 step 4).
    tokio::spawn(webhook_consumer::run(ctx.clone(), bus.clone()));

    // Reclaims pending entries abandoned by a crashed consumer (SPEC_FULL §A.5).
    tokio::spawn(run_reaper(
        bus.clone(),
        payment_orchestrator::services::topics::PROVIDER_EVENTS,
    ));

    let app = router(ctx);
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!(addr = %settings.bind_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
