//! Persistence boundary for submitted data and the public catalog.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use sessiongate_core::{CatalogItem, DataEntry};

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryCatalogRepository, InMemoryDataRepository};
pub use postgres::PostgresRepository;

/// Backend failure. Callers treat every variant as "service unavailable".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{op}: backend unavailable: {message}")]
    Unavailable { op: &'static str, message: String },

    #[error("{op}: backend call timed out")]
    Timeout { op: &'static str },
}

impl RepositoryError {
    pub fn op(&self) -> &'static str {
        match self {
            Self::Unavailable { op, .. } | Self::Timeout { op } => op,
        }
    }
}

#[async_trait]
pub trait DataRepository: Send + Sync {
    /// Persist `entry`, replacing any value already stored under its key.
    ///
    /// Callers validate the entry first; implementations do not re-check it.
    async fn save_data(&self, entry: &DataEntry) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Every catalog item, ordered by id. An empty catalog is `Ok(vec![])`.
    async fn list_catalog_items(&self) -> Result<Vec<CatalogItem>, RepositoryError>;
}

/// Run `call`, turning an overrun into [`RepositoryError::Timeout`].
pub(crate) async fn bounded<T>(
    op: &'static str,
    limit: Duration,
    call: impl Future<Output = Result<T, RepositoryError>>,
) -> Result<T, RepositoryError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(RepositoryError::Timeout { op }))
}

/// Map SQLx errors into [`RepositoryError`].
///
/// Every driver failure is an outage from the caller's point of view; the
/// message keeps enough detail for the error log.
pub(crate) fn map_sqlx_error(op: &'static str, err: sqlx::Error) -> RepositoryError {
    let message = match err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) => format!("database error {code}: {}", db_err.message()),
            None => format!("database error: {}", db_err.message()),
        },
        sqlx::Error::PoolTimedOut => {
            return RepositoryError::Timeout { op };
        }
        sqlx::Error::PoolClosed => "connection pool closed".to_string(),
        other => format!("sqlx error: {other}"),
    };
    RepositoryError::Unavailable { op, message }
}
