use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storefront_orders::catalog::FixtureCatalog;
use storefront_orders::config::{GatewayKind, ServerConfig, StoreBackend};
use storefront_orders::domain::cart::InMemoryCartStore;
use storefront_orders::domain::order::{
    ensure_index_schema, InMemoryOrderIndex, OrderEvent, OrderIndex, PaymentMethod, ScyllaOrderIndex,
};
use storefront_orders::event_sourcing::{ensure_event_schema, EventStore, InMemoryEventStore, ScyllaEventStore};
use storefront_orders::http::{self, AppState};
use storefront_orders::metrics::Metrics;
use storefront_orders::payments::{GatewayRegistry, PaymentGateway, ResilientGateway, SimulatedGateway, StripeGateway};
use storefront_orders::services::{Backends, Services};

type Stores = (Arc<dyn EventStore<OrderEvent>>, Arc<dyn OrderIndex>);

async fn connect_scylla(config: &ServerConfig) -> anyhow::Result<Arc<Session>> {
    tracing::info!(nodes = ?config.scylla_nodes, "Connecting to ScyllaDB...");
    let session: Session = SessionBuilder::new()
        .known_nodes(&config.scylla_nodes)
        .build()
        .await?;

    session
        .query_unpaged(
            format!(
                "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                 {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                config.scylla_keyspace
            ),
            &[],
        )
        .await?;
    session.use_keyspace(&config.scylla_keyspace, false).await?;

    ensure_event_schema(&session).await?;
    ensure_index_schema(&session).await?;

    Ok(Arc::new(session))
}

async fn build_stores(config: &ServerConfig) -> anyhow::Result<Stores> {
    let stores: Stores = match config.store {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory event store; orders are lost on restart");
            let event_store: Arc<dyn EventStore<OrderEvent>> = Arc::new(InMemoryEventStore::<OrderEvent>::new());
            let index: Arc<dyn OrderIndex> = Arc::new(InMemoryOrderIndex::new());
            (event_store, index)
        }
        StoreBackend::Scylla => {
            let session = connect_scylla(config).await?;
            let event_store: Arc<dyn EventStore<OrderEvent>> =
                Arc::new(ScyllaEventStore::<OrderEvent>::new(session.clone(), "Order"));
            let index: Arc<dyn OrderIndex> = Arc::new(ScyllaOrderIndex::new(session));
            (event_store, index)
        }
    };
    Ok(stores)
}

fn build_gateways(config: &ServerConfig, metrics: Arc<Metrics>) -> anyhow::Result<GatewayRegistry> {
    let inner: Arc<dyn PaymentGateway> = match config.gateway {
        GatewayKind::Simulated => {
            tracing::warn!("Using the simulated payment gateway; intents capture when first retrieved");
            Arc::new(SimulatedGateway::auto_capturing())
        }
        GatewayKind::Stripe => Arc::new(StripeGateway::new(config.stripe_config()?)),
    };
    let gateway: Arc<dyn PaymentGateway> = Arc::new(ResilientGateway::new(inner, config.gateway_policy(), metrics));

    Ok(GatewayRegistry::new()
        .register(PaymentMethod::Stripe, gateway.clone())
        .register(PaymentMethod::Vnpay, gateway))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;

    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,storefront_orders=debug"))
        )
        .init();

    tracing::info!("Starting storefront order service");

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 2. Storage ===
    let (event_store, index) = build_stores(&config).await?;

    // === 3. Catalog, coupons and gateways ===
    let catalog = Arc::new(FixtureCatalog::load(&config.catalog_fixture)?);
    tracing::info!(path = %config.catalog_fixture.display(), "Catalog fixture loaded");
    let gateways = build_gateways(&config, metrics.clone())?;

    // === 4. Services ===
    let backends = Backends {
        event_store,
        index,
        carts: Arc::new(InMemoryCartStore::new()),
        catalog: catalog.clone(),
        coupons: catalog,
        gateways,
    };
    let services = Services::new(backends, config.store_settings(), metrics.clone());

    let state = web::Data::new(AppState {
        services,
        metrics,
        store_backend: config.store.as_str().to_string(),
    });

    // === 5. HTTP ===
    let addr = config.socket_addr();
    tracing::info!(%addr, "Listening");
    HttpServer::new(move || App::new().configure(http::configure(state.clone())))
        .bind(&addr)?
        .run()
        .await?;

    tracing::info!("Shut down");
    Ok(())
}
