//! Process-local repositories for environments without a database.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use sessiongate_core::{CatalogItem, CatalogItemId, DataEntry};

use super::{CatalogRepository, DataRepository, RepositoryError};

fn poisoned(op: &'static str) -> RepositoryError {
    RepositoryError::Unavailable {
        op,
        message: "lock poisoned".to_string(),
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDataRepository {
    entries: RwLock<BTreeMap<String, String>>,
}

impl InMemoryDataRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DataRepository for InMemoryDataRepository {
    async fn save_data(&self, entry: &DataEntry) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().map_err(|_| poisoned("data.save"))?;
        entries.insert(entry.key.clone(), entry.value.clone());
        Ok(())
    }
}

/// Catalog held in memory; seeded at startup, read-only afterwards.
#[derive(Debug, Default)]
pub struct InMemoryCatalogRepository {
    items: RwLock<BTreeMap<CatalogItemId, CatalogItem>>,
}

impl InMemoryCatalogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        Self {
            items: RwLock::new(items.into_iter().map(|i| (i.id, i)).collect()),
        }
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn list_catalog_items(&self) -> Result<Vec<CatalogItem>, RepositoryError> {
        let items = self.items.read().map_err(|_| poisoned("catalog.list"))?;
        Ok(items.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_is_an_upsert() {
        let repo = InMemoryDataRepository::new();
        repo.save_data(&DataEntry::new("color", "red")).await.unwrap();
        repo.save_data(&DataEntry::new("color", "blue")).await.unwrap();

        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get("color").as_deref(), Some("blue"));
    }

    #[tokio::test]
    async fn empty_catalog_lists_as_empty_vec() {
        let repo = InMemoryCatalogRepository::new();
        assert_eq!(repo.list_catalog_items().await.unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn catalog_is_ordered_by_id() {
        let a = CatalogItem::new("a", "first");
        let b = CatalogItem::new("b", "").disabled();
        let c = CatalogItem::new("c", "third");
        let mut expected = vec![a.clone(), b.clone(), c.clone()];
        expected.sort_by_key(|i| i.id);

        let repo = InMemoryCatalogRepository::with_items([c, a, b]);
        assert_eq!(repo.list_catalog_items().await.unwrap(), expected);
    }
}
