//! Connection pool bootstrap and schema provisioning.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::instrument;

use crate::config::PostgresConfig;
use crate::error::AppError;

const SCHEMA: &str = include_str!("schema.sql");

#[instrument(skip(config))]
pub async fn build_pool(config: &PostgresConfig) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_open_connections)
        .min_connections(config.max_idle_connections)
        .max_lifetime(Duration::from_secs(config.conn_max_lifetime_minutes * 60))
        .connect(&config.connection_string())
        .await
        .map_err(|e| AppError::internal("store", "connect", "DISC-PG-CONNECT", e))?;

    // `raw_sql` (unprepared, simple query protocol) is required here since
    // the bootstrap script is more than one statement.
    sqlx::raw_sql(SCHEMA)
        .execute(&pool)
        .await
        .map_err(|e| AppError::internal("store", "bootstrap_schema", "DISC-PG-SCHEMA", e))?;

    Ok(pool)
}
