//! Postgres-backed repositories and user directory.
//!
//! ## Error Mapping
//!
//! | SQLx Error | Repository / Directory error |
//! |------------|------------------------------|
//! | `PoolTimedOut` | `Timeout` |
//! | Database, `PoolClosed`, I/O, anything else | `Unavailable` |
//!
//! Every call is additionally bounded by the configured backend timeout.
//!
//! ## Thread Safety
//!
//! `PostgresRepository` is `Send + Sync` and cheap to clone; all access goes
//! through the shared SQLx pool.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::{Span, error, instrument};
use uuid::Uuid;

use sessiongate_auth::{DirectoryError, UserDirectory};
use sessiongate_core::{CatalogItem, CatalogItemId, DataEntry, Identity, UserId};

use super::{CatalogRepository, DataRepository, RepositoryError, bounded, map_sqlx_error};

#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresRepository {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DataRepository for PostgresRepository {
    #[instrument(skip(self, entry), fields(key = %entry.key), err)]
    async fn save_data(&self, entry: &DataEntry) -> Result<(), RepositoryError> {
        const OP: &str = "data.save";

        bounded(OP, self.timeout, async {
            sqlx::query(
                r#"
                INSERT INTO data (key, value, updated_at)
                VALUES ($1, $2, now())
                ON CONFLICT (key) DO UPDATE
                SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(&entry.key)
            .bind(&entry.value)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(OP, e))?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl CatalogRepository for PostgresRepository {
    #[instrument(skip(self), fields(item_count = tracing::field::Empty), err)]
    async fn list_catalog_items(&self) -> Result<Vec<CatalogItem>, RepositoryError> {
        const OP: &str = "catalog.list";

        let rows = bounded(OP, self.timeout, async {
            sqlx::query(
                r#"
                SELECT id, title, description, disabled
                FROM catalog_items
                ORDER BY id ASC
                "#,
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(OP, e))
        })
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let item = CatalogItemRow::from_row(&row).map_err(|e| map_sqlx_error(OP, e))?;
            items.push(item.into());
        }

        Span::current().record("item_count", items.len());
        Ok(items)
    }
}

#[async_trait]
impl UserDirectory for PostgresRepository {
    #[instrument(skip(self, email), err)]
    async fn lookup_by_email(&self, email: &str) -> Result<Option<Identity>, DirectoryError> {
        const OP: &str = "users.lookup_by_email";

        let row = bounded(OP, self.timeout, async {
            sqlx::query(
                r#"
                SELECT id, email, password_hash, created_at
                FROM users
                WHERE email = $1
                LIMIT 1
                "#,
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(OP, e))
        })
        .await
        .map_err(directory_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user = UserRow::from_row(&row)
            .map_err(|e| directory_error(map_sqlx_error(OP, e)))?;
        Ok(Some(user.into()))
    }
}

fn directory_error(err: RepositoryError) -> DirectoryError {
    error!(op = err.op(), error = %err, "user directory query failed");
    match err {
        RepositoryError::Timeout { .. } => DirectoryError::Timeout,
        RepositoryError::Unavailable { .. } => DirectoryError::Unavailable(err.to_string()),
    }
}

struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for UserRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<UserRow> for Identity {
    fn from(row: UserRow) -> Self {
        Identity::new(
            UserId::from_uuid(row.id),
            row.email,
            row.password_hash,
            row.created_at,
        )
    }
}

struct CatalogItemRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    disabled: bool,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for CatalogItemRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            disabled: row.try_get("disabled")?,
        })
    }
}

impl From<CatalogItemRow> for CatalogItem {
    fn from(row: CatalogItemRow) -> Self {
        CatalogItem {
            id: CatalogItemId::from_uuid(row.id),
            title: row.title,
            description: row.description.unwrap_or_default(),
            disabled: row.disabled,
        }
    }
}
