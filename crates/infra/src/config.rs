//! Process configuration, read once at startup from the environment.
//!
//! Every key has a default except the database, which is optional: without
//! one the data and catalog repositories run in memory.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use sessiongate_observability::{LogDestination, LoggingConfig};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("AUTH_PROVIDER=postgres requires DATABASE_URL or PG_HOST")]
    DatabaseRequired,
}

/// Which [`UserDirectory`](sessiongate_auth::UserDirectory) backs login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProviderKind {
    /// The built-in single identity.
    Fixed,
    Postgres,
}

impl FromStr for AuthProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" | "inmemory" => Ok(Self::Fixed),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            _ => Err("expected one of: fixed, inmemory, postgres".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    Memory,
    Redis,
}

impl FromStr for SessionBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "inmemory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            _ => Err("expected one of: memory, redis".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on handling one request, body read included.
    pub request_timeout: Duration,
}

impl HttpConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    pub ttl: Duration,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub redis_url: String,
}

/// How to reach Postgres.
#[derive(Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Url(String),
    Parts {
        host: String,
        port: u16,
        user: String,
        password: String,
        dbname: String,
        sslmode: Option<String>,
    },
}

impl core::fmt::Debug for DatabaseTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Url(_) => f.write_str("Url(<redacted>)"),
            Self::Parts {
                host, port, dbname, ..
            } => f
                .debug_struct("Parts")
                .field("host", host)
                .field("port", port)
                .field("dbname", dbname)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub target: DatabaseTarget,
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub auth_provider: AuthProviderKind,
    pub session: SessionConfig,
    /// Bound on every directory, session store and repository call.
    pub backend_timeout: Duration,
    pub database: Option<DatabaseConfig>,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let http = HttpConfig {
            host: env.string("HTTP_HOST", "0.0.0.0"),
            port: env.parse("HTTP_PORT", 8080)?,
            request_timeout: Duration::from_millis(env.parse("HTTP_REQUEST_TIMEOUT_MS", 10_000)?),
        };
        if http.request_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: "HTTP_REQUEST_TIMEOUT_MS",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let session = SessionConfig {
            backend: env.parse("SESSION_STORE", SessionBackend::Memory)?,
            ttl: Duration::from_secs(env.parse("SESSION_TTL_SECS", 24 * 60 * 60)?),
            cookie_name: env.string("SESSION_COOKIE_NAME", "session"),
            cookie_secure: env.parse("SESSION_COOKIE_SECURE", false)?,
            redis_url: env.string("REDIS_URL", "redis://127.0.0.1:6379"),
        };
        if session.cookie_name.is_empty() {
            return Err(ConfigError::Invalid {
                key: "SESSION_COOKIE_NAME",
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }

        let database = Self::database(&env)?;
        let auth_provider = env.parse("AUTH_PROVIDER", AuthProviderKind::Fixed)?;
        if auth_provider == AuthProviderKind::Postgres && database.is_none() {
            return Err(ConfigError::DatabaseRequired);
        }

        let logging = LoggingConfig {
            enabled: env.parse("LOG_ENABLED", true)?,
            level: env.string("LOG_LEVEL", "info"),
            destination: env
                .get("LOG_DESTINATION")
                .map(|v| v.parse::<LogDestination>().unwrap_or_default())
                .unwrap_or_default(),
        };

        Ok(Self {
            http,
            auth_provider,
            session,
            backend_timeout: Duration::from_millis(env.parse("BACKEND_TIMEOUT_MS", 5_000)?),
            database,
            logging,
        })
    }

    fn database(env: &Env<'_>) -> Result<Option<DatabaseConfig>, ConfigError> {
        let target = if let Some(url) = env.get("DATABASE_URL") {
            DatabaseTarget::Url(url)
        } else if let Some(host) = env.get("PG_HOST") {
            DatabaseTarget::Parts {
                host,
                port: env.parse("PG_PORT", 5432)?,
                user: env.string("PG_USER", "postgres"),
                password: env.string("PG_PASSWORD", ""),
                dbname: env.string("PG_DBNAME", "postgres"),
                sslmode: env.get("PG_SSLMODE"),
            }
        } else {
            return Ok(None);
        };

        Ok(Some(DatabaseConfig {
            target,
            max_connections: env.parse("PG_MAX_CONNECTIONS", 10)?,
            min_connections: 2,
            max_lifetime: Duration::from_secs(60 * 60),
            idle_timeout: Duration::from_secs(30 * 60),
        }))
    }
}

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Unset and blank values both count as absent.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: core::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        }
    }
}
