//! Key/value data submitted by authenticated clients.

use serde::{Deserialize, Serialize};

use crate::{DomainError, DomainResult};

/// A single key/value pair to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    pub key: String,
    pub value: String,
}

impl DataEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Reject entries that must never reach a backend.
    ///
    /// The key is the storage identity, so it must be non-empty. Values may be
    /// empty.
    pub fn validate(&self) -> DomainResult<()> {
        if self.key.is_empty() {
            return Err(DomainError::validation("key cannot be empty"));
        }
        Ok(())
    }
}
