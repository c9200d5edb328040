mod models;
mod seeders;

pub mod cart;
pub mod orders;
pub mod products;
pub mod users;

pub use models::*;
pub use seeders::{seed_demo_data, DEMO_BUYER_EMAIL, DEMO_PASSWORD, DEMO_SELLER_EMAIL};

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

pub type DbPool = PgPool;

/// Connect to Postgres and apply pending migrations.
pub async fn init(config: &DatabaseConfig) -> Result<DbPool> {
    let pool = connect(config).await?;
    run_migrations(&pool).await?;
    info!("Database initialized successfully");
    Ok(pool)
}

pub async fn connect(config: &DatabaseConfig) -> Result<DbPool> {
    info!(
        max_connections = config.max_connections,
        "Connecting to database"
    );

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.url)
        .await
        .context("Failed to connect to database")
}

/// Build a pool that only connects on first use.
pub fn connect_lazy(config: &DatabaseConfig) -> Result<DbPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_lazy(&config.url)
        .context("Invalid database URL")
}

pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to apply database migrations")?;
    Ok(())
}

/// Round-trip check used by health endpoints and startup checks
pub async fn ping(pool: &DbPool) -> bool {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .is_ok()
}
