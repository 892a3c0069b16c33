use anyhow::{anyhow, Result};
use diesel::Connection;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::pooled_connection::deadpool::{Object, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::Arc;
use tokio::time::Duration;
use tracing;

use crate::config::DatabaseConfig;

pub type DbPool = Pool<AsyncPgConnection>;
pub type DbConnection = Object<AsyncPgConnection>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("../migrations");

pub async fn create_pool(config: &DatabaseConfig) -> Result<Arc<DbPool>> {
    let url = config
        .url
        .as_deref()
        .ok_or_else(|| anyhow!("DATABASE_URL is not set"))?;

    tracing::info!("Setting up database connection pool");
    tracing::info!("Database URL: {}", mask_database_url(url));

    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(url);

    let pool = Pool::builder(manager)
        .max_size(config.max_connections as usize)
        .build()
        .map_err(|e| anyhow!("Failed to create connection pool: {}", e))?;

    // Test the connection with retry logic
    let mut last_error = None;
    for attempt in 1..=5 {
        match tokio::time::timeout(Duration::from_secs(15), pool.get()).await {
            Ok(Ok(_conn)) => {
                tracing::info!("Database connection established");
                return Ok(Arc::new(pool));
            }
            Ok(Err(e)) => {
                tracing::warn!("Database connection failed on attempt {}: {}", attempt, e);
                last_error = Some(anyhow!("Database connection failed: {}", e));
            }
            Err(_) => {
                tracing::warn!("Database connection timed out on attempt {}", attempt);
                last_error = Some(anyhow!("Database connection timed out"));
            }
        }

        if attempt < 5 {
            let wait_time = Duration::from_secs(2_u64.pow(attempt - 1));
            tracing::info!("Waiting {:?} before retry...", wait_time);
            tokio::time::sleep(wait_time).await;
        }
    }

    Err(last_error
        .unwrap_or_else(|| anyhow!("Failed to establish database connection after 5 attempts")))
}

/// Runs the embedded migrations on a blocking thread; the sync wrapper
/// drives the async connection internally.
pub async fn run_migrations(config: &DatabaseConfig) -> Result<()> {
    let url = config
        .url
        .clone()
        .ok_or_else(|| anyhow!("DATABASE_URL is not set"))?;

    tokio::task::spawn_blocking(move || {
        let mut conn: AsyncConnectionWrapper<AsyncPgConnection> =
            AsyncConnectionWrapper::establish(&url)
                .map_err(|e| anyhow!("Failed to connect for migrations: {}", e))?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow!("Failed to run migrations: {}", e))?;
        tracing::info!("Applied {} pending migration(s)", applied.len());
        Ok::<_, anyhow::Error>(())
    })
    .await??;

    Ok(())
}

fn mask_database_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        let (before_at, after_at) = url.split_at(at_pos);
        if let Some(colon_pos) = before_at.rfind(':') {
            let (protocol_user, _password) = before_at.split_at(colon_pos);
            format!("{}:****@{}", protocol_user, after_at)
        } else {
            "postgres://****@****".to_string()
        }
    } else {
        "Invalid URL format".to_string()
    }
}
