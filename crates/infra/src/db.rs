//! Postgres connection pool and schema bootstrap.

use std::str::FromStr;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::{DatabaseConfig, DatabaseTarget};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("invalid database configuration: {0}")]
    Config(String),

    #[error("failed to connect to postgres: {0}")]
    Connection(String),

    #[error("schema bootstrap failed at step {step}: {message}")]
    Schema { step: usize, message: String },
}

/// Tables the service reads and writes. Every statement is idempotent.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            UUID PRIMARY KEY,
        email         TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS data (
        key        TEXT PRIMARY KEY,
        value      TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS catalog_items (
        id          UUID PRIMARY KEY,
        title       TEXT NOT NULL,
        description TEXT NULL,
        disabled    BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
];

fn connect_options(target: &DatabaseTarget) -> Result<PgConnectOptions, DbError> {
    match target {
        DatabaseTarget::Url(url) => {
            PgConnectOptions::from_str(url).map_err(|e| DbError::Config(e.to_string()))
        }
        DatabaseTarget::Parts {
            host,
            port,
            user,
            password,
            dbname,
            sslmode,
        } => {
            let mut options = PgConnectOptions::new()
                .host(host)
                .port(*port)
                .username(user)
                .password(password)
                .database(dbname);
            if let Some(mode) = sslmode {
                let mode = PgSslMode::from_str(mode)
                    .map_err(|e| DbError::Config(format!("PG_SSLMODE: {e}")))?;
                options = options.ssl_mode(mode);
            }
            Ok(options)
        }
    }
}

/// Open the process-wide pool and verify it with one round trip.
///
/// `acquire_timeout` is the per-call backend timeout: a request never queues
/// on the pool for longer than it would wait on the query itself.
#[instrument(skip(config), fields(max_connections = config.max_connections), err)]
pub async fn connect(
    config: &DatabaseConfig,
    acquire_timeout: Duration,
) -> Result<PgPool, DbError> {
    let options = connect_options(&config.target)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .acquire_timeout(acquire_timeout)
        .connect_with(options)
        .await
        .map_err(|e| DbError::Connection(e.to_string()))?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(|e| DbError::Connection(e.to_string()))?;

    info!("postgres pool ready");
    Ok(pool)
}

/// Create the tables if they do not exist yet.
#[instrument(skip(pool), err)]
pub async fn bootstrap_schema(pool: &PgPool) -> Result<(), DbError> {
    for (step, statement) in SCHEMA.iter().enumerate() {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| DbError::Schema {
                step,
                message: e.to_string(),
            })?;
    }

    info!(tables = SCHEMA.len(), "schema bootstrap complete");
    Ok(())
}
