//! Database pool construction

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Create the main connection pool used for request handling.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await?;

    tracing::info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Create a small pool for running migrations at startup.
///
/// Migrations take session-level locks, so they get their own short-lived
/// pool instead of competing with request traffic.
pub async fn create_migration_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(60))
        .connect(database_url)
        .await
}
