//! Storefront Orders - checkout and order consistency service

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_orders::{
    api::{self, AppState},
    auth::Authenticator,
    config::Config,
    messaging::{EventPublisher, NatsPublisher, NoopPublisher},
    payments::{HostedCheckoutClient, WebhookVerifier},
    services::{CartService, CheckoutOrchestrator, OrderService, Reconciler, RedirectUrls},
    store::{
        CartStore, CatalogStore, MemoryCartStore, MemoryCatalogStore, MemoryOrderStore, OrderStore, PgCartStore,
        PgCatalogStore, PgOrderStore,
    },
};

type Stores = (Arc<dyn CatalogStore>, Arc<dyn CartStore>, Arc<dyn OrderStore>);

async fn stores(config: &Config) -> Result<Stores> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; using in-memory stores");
        let stores: Stores = (
            Arc::new(MemoryCatalogStore::new()),
            Arc::new(MemoryCartStore::new()),
            Arc::new(MemoryOrderStore::new()),
        );
        return Ok(stores);
    };
    let db = PgPoolOptions::new().max_connections(10).connect(url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    let stores: Stores = (
        Arc::new(PgCatalogStore::new(db.clone())),
        Arc::new(PgCartStore::new(db.clone())),
        Arc::new(PgOrderStore::new(db)),
    );
    Ok(stores)
}

async fn publisher(config: &Config) -> Arc<dyn EventPublisher> {
    let Some(url) = config.nats_url.as_deref() else { return Arc::new(NoopPublisher) };
    match async_nats::connect(url).await {
        Ok(client) => Arc::new(NatsPublisher::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, %url, "NATS unavailable; order events will not be published");
            Arc::new(NoopPublisher)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let (catalog, carts, orders) = stores(&config).await?;
    let events = publisher(&config).await;
    let gateway = Arc::new(HostedCheckoutClient::new(&config.payments)?);

    let order_service = OrderService::new(orders, events);
    let state = AppState {
        auth: Arc::new(Authenticator::new(&config.jwt_secret, config.identity_cache_ttl)),
        catalog: catalog.clone(),
        carts: CartService::new(carts.clone(), catalog.clone()),
        orders: order_service.clone(),
        checkout: CheckoutOrchestrator::new(
            carts,
            catalog,
            order_service.clone(),
            gateway.clone(),
            RedirectUrls::new(config.storefront_url.clone()),
            config.payments.timeout,
        ),
        reconciler: Reconciler::new(
            order_service,
            gateway,
            WebhookVerifier::new(config.payments.webhook_secret.clone(), config.payments.webhook_tolerance),
            config.payments.timeout,
        ),
    };

    let app = api::router(state).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    tracing::info!("Storefront orders listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?, app).await?;
    Ok(())
}
