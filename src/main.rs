//! Catalog back office - admin API for products, collections and orders

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog_backoffice::api::{build_app, AppState};
use catalog_backoffice::config::{load_app_config, StoreBackend};
use catalog_backoffice::domain::events::EventPublisher;
use catalog_backoffice::identity::StaticTokenIdentity;
use catalog_backoffice::store::{CatalogStore, MemoryStore, PgStore};
use catalog_backoffice::CatalogService;

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_app_config()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.as_str().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store: Arc<dyn CatalogStore> = match &config.store {
        StoreBackend::Postgres { database_url, max_connections } => {
            let store = PgStore::connect(database_url, *max_connections).await.context("connecting to postgres")?;
            store.migrate().await.context("running migrations")?;
            Arc::new(store)
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let events = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => EventPublisher::new(Some(client)),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable; domain events disabled");
                EventPublisher::disabled()
            }
        },
        None => EventPublisher::disabled(),
    };
    tracing::info!(enabled = events.is_enabled(), "domain event publishing");

    let identity = StaticTokenIdentity::new(config.api_tokens.clone());
    if identity.is_empty() {
        tracing::warn!("BACKOFFICE_API_TOKENS is empty; every mutating request will be rejected");
    }

    let state = AppState::new(CatalogService::new(store, events), Arc::new(identity));
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Catalog back office listening on {}", config.bind_addr);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
