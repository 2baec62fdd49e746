use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use sessiongate_auth::{
    AuthGate, AuthProvider, BcryptHasher, CookieSettings, FixedUserDirectory, InMemorySessionStore,
    SessionManager, SessionStore, UserDirectory,
};
use sessiongate_core::{CatalogItem, DataEntry};
use sessiongate_infra::config::{AppConfig, AuthProviderKind, SessionBackend};
use sessiongate_infra::db;
use sessiongate_infra::repository::{
    CatalogRepository, DataRepository, InMemoryCatalogRepository, InMemoryDataRepository,
    PostgresRepository,
};

use crate::app::errors::ApiError;

/// How often abandoned in-memory sessions are swept.
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Request deadline when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Accepts key/value submissions from authenticated callers.
#[derive(Clone)]
pub struct DataService {
    repo: Arc<dyn DataRepository>,
}

impl DataService {
    pub fn new(repo: Arc<dyn DataRepository>) -> Self {
        Self { repo }
    }

    /// Validate, then persist. Invalid entries never reach the repository.
    pub async fn save_data(&self, entry: &DataEntry) -> Result<(), ApiError> {
        entry.validate()?;
        self.repo.save_data(entry).await?;
        info!(op = "data.save", key = %entry.key, "data saved");
        Ok(())
    }
}

#[derive(Clone)]
pub struct CatalogService {
    repo: Arc<dyn CatalogRepository>,
}

impl CatalogService {
    pub fn new(repo: Arc<dyn CatalogRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<CatalogItem>, ApiError> {
        Ok(self.repo.list_catalog_items().await?)
    }
}

/// Everything a handler needs, chosen once at startup.
#[derive(Clone)]
pub struct AppServices {
    pub auth: AuthProvider,
    pub sessions: SessionManager,
    pub gate: AuthGate,
    pub data: DataService,
    pub catalog: CatalogService,
    /// Deadline for handling one request; exceeding it answers 408.
    pub request_timeout: Duration,
}

impl AppServices {
    pub fn new(
        auth: AuthProvider,
        sessions: SessionManager,
        data: Arc<dyn DataRepository>,
        catalog: Arc<dyn CatalogRepository>,
    ) -> Self {
        Self {
            auth,
            sessions,
            gate: AuthGate::new(),
            data: DataService::new(data),
            catalog: CatalogService::new(catalog),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Fully in-process wiring around `directory` (dev/test).
    pub fn in_memory(directory: Arc<dyn UserDirectory>) -> Self {
        Self::new(
            AuthProvider::new(directory, Arc::new(BcryptHasher::new())),
            SessionManager::new(Arc::new(InMemorySessionStore::new())),
            Arc::new(InMemoryDataRepository::new()),
            Arc::new(InMemoryCatalogRepository::new()),
        )
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let timeout = config.backend_timeout;

    let postgres = match &config.database {
        Some(database) => {
            let pool = db::connect(database, timeout)
                .await
                .context("failed to connect to postgres")?;
            Some(PostgresRepository::new(pool, timeout))
        }
        None => None,
    };

    let directory: Arc<dyn UserDirectory> = match (config.auth_provider, &postgres) {
        (AuthProviderKind::Postgres, Some(repo)) => Arc::new(repo.clone()),
        (AuthProviderKind::Postgres, None) => {
            anyhow::bail!("AUTH_PROVIDER=postgres requires a database")
        }
        (AuthProviderKind::Fixed, _) => {
            warn!("using the built-in fixed identity; not for production");
            Arc::new(FixedUserDirectory::new())
        }
    };
    let auth =
        AuthProvider::new(directory, Arc::new(BcryptHasher::new())).with_lookup_timeout(timeout);

    let store = session_store(config).await?;
    let sessions = SessionManager::new(store)
        .with_ttl(config.session.ttl)
        .with_store_timeout(timeout)
        .with_cookie_settings(CookieSettings {
            name: config.session.cookie_name.clone(),
            secure: config.session.cookie_secure,
        });

    let (data, catalog): (Arc<dyn DataRepository>, Arc<dyn CatalogRepository>) = match postgres {
        Some(repo) => (Arc::new(repo.clone()), Arc::new(repo)),
        None => {
            warn!("no database configured; data and catalog are kept in memory");
            (
                Arc::new(InMemoryDataRepository::new()),
                Arc::new(InMemoryCatalogRepository::new()),
            )
        }
    };

    info!(
        auth_provider = ?config.auth_provider,
        session_backend = ?config.session.backend,
        "services wired"
    );
    Ok(AppServices::new(auth, sessions, data, catalog)
        .with_request_timeout(config.http.request_timeout))
}

async fn session_store(config: &AppConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    match config.session.backend {
        SessionBackend::Memory => {
            let store = Arc::new(InMemorySessionStore::new());
            spawn_session_purge(Arc::clone(&store));
            Ok(store)
        }
        #[cfg(feature = "redis")]
        SessionBackend::Redis => {
            let store = sessiongate_infra::session_store::RedisSessionStore::connect(
                &config.session.redis_url,
            )
            .await
            .context("failed to connect to redis")?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis"))]
        SessionBackend::Redis => {
            anyhow::bail!("SESSION_STORE=redis but the redis feature is not enabled")
        }
    }
}

fn spawn_session_purge(store: Arc<InMemorySessionStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match store.purge_expired() {
                Ok(0) => {}
                Ok(removed) => info!(op = "session.purge", removed, "expired sessions purged"),
                Err(e) => warn!(op = "session.purge", error = %e, "session purge failed"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use sessiongate_infra::repository::RepositoryError;

    use super::*;

    #[derive(Default)]
    struct CountingRepo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DataRepository for CountingRepo {
        async fn save_data(&self, _entry: &DataEntry) -> Result<(), RepositoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn empty_key_never_reaches_the_repository() {
        let repo = Arc::new(CountingRepo::default());
        let service = DataService::new(repo.clone());

        let err = service.save_data(&DataEntry::new("", "v")).await.unwrap_err();
        assert!(matches!(err, ApiError::Domain(_)));
        assert_eq!(repo.calls.load(Ordering::SeqCst), 0);

        service.save_data(&DataEntry::new("k", "v")).await.unwrap();
        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn in_memory_config_builds_without_backends() {
        let config = AppConfig::from_map(&Default::default()).unwrap();
        let services = build_services(&config).await.unwrap();
        assert!(services.catalog.list().await.unwrap().is_empty());
        assert_eq!(services.sessions.cookie_settings().name, "session");
        assert_eq!(services.request_timeout, config.http.request_timeout);
    }
}
