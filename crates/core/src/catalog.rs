//! Read-only catalog listing model.

use serde::{Deserialize, Serialize};

use crate::CatalogItemId;

/// A catalog entry as exposed by the public listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: CatalogItemId,
    pub title: String,
    /// Empty when the backend stores no description.
    pub description: String,
    pub disabled: bool,
}

impl CatalogItem {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: CatalogItemId::new(),
            title: title.into(),
            description: description.into(),
            disabled: false,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}
