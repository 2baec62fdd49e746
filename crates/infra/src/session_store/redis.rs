//! Redis-backed session store (shared across instances, survives restarts).
//!
//! - **Key**: `session:<token>`
//! - **Value**: the [`SessionRecord`] as JSON
//! - **Expiry**: Redis `PX`, set once on create and never extended
//!
//! `put_many` is a read-modify-write of one key committed by a single `SET`,
//! so a batch lands whole. Concurrent writes to the *same* session are
//! last-writer-wins. Distinct sessions never interact.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use tracing::{debug, info, instrument};

use sessiongate_auth::{SessionRecord, SessionStore, SessionStoreError, SessionToken};

/// Default key prefix for session records.
const DEFAULT_KEY_PREFIX: &str = "session:";

#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl core::fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("connection", &"ConnectionManager")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

fn map_redis_error(op: &str, err: redis::RedisError) -> SessionStoreError {
    if err.is_timeout() {
        SessionStoreError::Timeout
    } else {
        SessionStoreError::Unavailable(format!("{op} failed: {err}"))
    }
}

/// Milliseconds for `PX`; `None` when the record would be born expired.
fn expiry_millis(ttl: Duration) -> Option<u64> {
    let ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    (ms > 0).then_some(ms)
}

impl RedisSessionStore {
    /// Connect to Redis at `redis_url` (e.g. `redis://localhost:6379`).
    pub async fn connect(redis_url: &str) -> Result<Self, SessionStoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| SessionStoreError::Unavailable(format!("invalid redis url: {e}")))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| map_redis_error("connect", e))?;

        info!("redis session store connected");
        Ok(Self {
            conn,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        })
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn key(&self, token: &SessionToken) -> String {
        format!("{}{}", self.key_prefix, token.as_str())
    }

    async fn read(&self, key: &str) -> Result<Option<SessionRecord>, SessionStoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("GET", e))?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let record: SessionRecord = serde_json::from_str(&raw)
            .map_err(|e| SessionStoreError::Unavailable(format!("corrupt session record: {e}")))?;

        // Redis expiry has millisecond precision; check anyway so both
        // backends agree at the boundary.
        if record.is_expired(Utc::now()) {
            return Ok(None);
        }
        Ok(Some(record))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    #[instrument(skip(self), err)]
    async fn create(&self, ttl: Duration) -> Result<SessionToken, SessionStoreError> {
        let Some(px) = expiry_millis(ttl) else {
            // Nothing to store: the record would be expired on arrival.
            return Ok(SessionToken::generate()?);
        };

        let record = SessionRecord::new(Utc::now(), ttl);
        let payload = serde_json::to_string(&record)
            .map_err(|e| SessionStoreError::Unavailable(format!("serialize session: {e}")))?;

        let mut conn = self.conn.clone();
        loop {
            let token = SessionToken::generate()?;
            let stored: Option<String> = redis::cmd("SET")
                .arg(self.key(&token))
                .arg(&payload)
                .arg("PX")
                .arg(px)
                .arg("NX")
                .query_async(&mut conn)
                .await
                .map_err(|e| map_redis_error("SET NX", e))?;

            if stored.is_some() {
                return Ok(token);
            }
            debug!("session token collision, regenerating");
        }
    }

    #[instrument(skip(self), err)]
    async fn load(&self, token: &SessionToken) -> Result<Option<SessionRecord>, SessionStoreError> {
        self.read(&self.key(token)).await
    }

    #[instrument(skip(self, attributes), fields(count = attributes.len()), err)]
    async fn put_many(
        &self,
        token: &SessionToken,
        attributes: &[(&str, &str)],
    ) -> Result<(), SessionStoreError> {
        let redis_key = self.key(token);
        let mut record = self
            .read(&redis_key)
            .await?
            .ok_or(SessionStoreError::NotFound)?;
        record.attributes.extend(
            attributes
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        );

        let payload = serde_json::to_string(&record)
            .map_err(|e| SessionStoreError::Unavailable(format!("serialize session: {e}")))?;

        // XX: never resurrect a record that expired or was destroyed meanwhile.
        let mut conn = self.conn.clone();
        let stored: Option<String> = redis::cmd("SET")
            .arg(&redis_key)
            .arg(payload)
            .arg("XX")
            .arg("KEEPTTL")
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("SET XX", e))?;

        stored.map(|_| ()).ok_or(SessionStoreError::NotFound)
    }

    #[instrument(skip(self), err)]
    async fn destroy(&self, token: &SessionToken) -> Result<(), SessionStoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(self.key(token))
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("DEL", e))?;
        Ok(())
    }
}
