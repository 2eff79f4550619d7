use {
    order_sync::{
        AppState,
        adapters::{routes::router, shopify_client::ShopifyClient},
        config::AppConfig,
        domain::{
            provider::{FulfillmentLookup, NoFulfillmentLookup},
            store::Store,
        },
        infra::{memory::MemoryStore, postgres::PgStore},
    },
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    tokio::signal,
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.max_db_connections)
                .acquire_timeout(Duration::from_secs(3))
                .connect(url)
                .await
                .expect("failed to connect to database");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("failed to run migrations");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (state is lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };

    let fulfillment_lookup: Arc<dyn FulfillmentLookup> = match config.shopify.clone() {
        Some(shopify) => {
            tracing::info!(store = %shopify.store, "Shopify fulfillment lookup enabled");
            Arc::new(ShopifyClient::new(shopify).expect("failed to build Shopify client"))
        }
        None => {
            tracing::info!("SHOPIFY_STORE/SHOPIFY_ADMIN_API not set, fulfillment lookup disabled");
            Arc::new(NoFulfillmentLookup)
        }
    };

    if config.webhook_secret.is_none() {
        tracing::warn!("SHOPIFY_WEBHOOK_SECRET not set, webhook signatures will NOT be verified");
    }

    let state = AppState {
        store,
        fulfillment_lookup,
        webhook_secret: config.webhook_secret.map(Into::into),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind listener");
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
