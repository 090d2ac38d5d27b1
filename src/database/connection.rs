//! # Database Connection Management
//!
//! Pool construction from [`crate::config::DatabaseConfig`].

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{EngineError, Result};

/// Build a connection pool from configuration
pub async fn establish_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let url = config.database_url();

    let pool = PgPoolOptions::new()
        .max_connections(config.pool)
        .acquire_timeout(Duration::from_secs(config.checkout_timeout_seconds))
        .connect(&url)
        .await
        .map_err(|e| EngineError::database("connect", e.to_string()))?;

    info!(
        max_connections = config.pool,
        "Database connection pool established"
    );

    Ok(pool)
}
