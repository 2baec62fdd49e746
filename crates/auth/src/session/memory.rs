use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::store::{SessionRecord, SessionStore, SessionStoreError};
use super::token::SessionToken;

/// Process-local session store.
///
/// Lost on restart and not shared between instances; intended for single
/// process deployments, dev and tests. Expired records are reaped lazily on
/// access and in bulk by [`InMemorySessionStore::purge_expired`].
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionToken, SessionRecord>>,
}

fn poisoned() -> SessionStoreError {
    SessionStoreError::Unavailable("lock poisoned".to_string())
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired record; returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, SessionStoreError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired(now));
        Ok(before - sessions.len())
    }

    /// Number of stored records, expired ones included until reaped.
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, ttl: Duration) -> Result<SessionToken, SessionStoreError> {
        let record = SessionRecord::new(Utc::now(), ttl);
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;

        loop {
            let token = SessionToken::generate()?;
            if !sessions.contains_key(&token) {
                sessions.insert(token.clone(), record);
                return Ok(token);
            }
        }
    }

    async fn load(&self, token: &SessionToken) -> Result<Option<SessionRecord>, SessionStoreError> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().map_err(|_| poisoned())?;
            match sessions.get(token) {
                None => return Ok(None),
                Some(record) if !record.is_expired(now) => return Ok(Some(record.clone())),
                Some(_) => {}
            }
        }

        // Expired: reap under the write lock.
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        if sessions.get(token).is_some_and(|r| r.is_expired(now)) {
            sessions.remove(token);
        }
        Ok(None)
    }

    async fn put_many(
        &self,
        token: &SessionToken,
        attributes: &[(&str, &str)],
    ) -> Result<(), SessionStoreError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;

        match sessions.get_mut(token) {
            Some(record) if !record.is_expired(now) => {
                record.attributes.extend(
                    attributes
                        .iter()
                        .map(|(key, value)| (key.to_string(), value.to_string())),
                );
                Ok(())
            }
            Some(_) => {
                sessions.remove(token);
                Err(SessionStoreError::NotFound)
            }
            None => Err(SessionStoreError::NotFound),
        }
    }

    async fn destroy(&self, token: &SessionToken) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        sessions.remove(token);
        Ok(())
    }
}
