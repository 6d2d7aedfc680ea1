use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod config;
mod error;
mod middleware;
mod models;
mod repositories;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod testing;

use common::database::{DatabaseConfig, ensure_schema, health_check, init_pool};
use common::store::postgres::PgStore;
use tokio::net::TcpListener;

use crate::{
    config::{AppConfig, StoreBackend},
    models::{MESSAGES, TOKENS},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting archive service");

    let config = AppConfig::load()?;

    let app_state = match config.store_backend {
        StoreBackend::Postgres => {
            let db_config = DatabaseConfig::from_env()?;
            let pool = init_pool(&db_config).await?;

            if health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            ensure_schema(&pool, &[&MESSAGES, &TOKENS]).await?;

            let store = PgStore::new(pool);
            AppState::new(
                Arc::new(store.collection(&MESSAGES)),
                Arc::new(store.collection(&TOKENS)),
                &config,
            )
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; archived data will not survive a restart");
            AppState::in_memory(&config)
        }
    };

    info!("Archive service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&config.server_address).await?;
    info!("Archive service listening on {}", config.server_address);

    axum::serve(listener, app).await?;

    Ok(())
}
