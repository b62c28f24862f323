//! In-memory [`DocumentStore`] for tests and embedding hosts.
//!
//! Batches live in a `HashMap` behind `std::sync::RwLock`, keyed by a
//! freshly generated UUID.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::Document;

use super::{DataRef, DocumentStore};

const BACKEND: &str = "memory";

/// In-memory batch store.
pub struct InMemoryStore {
    batches: RwLock<HashMap<String, Vec<Document>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            batches: RwLock::new(HashMap::new()),
        }
    }

    /// Number of batches stored so far, including empty ones.
    pub fn batch_count(&self) -> usize {
        self.batches.read().map(|b| b.len()).unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn store_documents(&self, docs: &[Document]) -> Result<DataRef> {
        let key = Uuid::new_v4().to_string();
        let mut batches = self
            .batches
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        batches.insert(key.clone(), docs.to_vec());
        Ok(DataRef::new(BACKEND, key, docs.len()))
    }

    async fn load_documents(&self, data_ref: &DataRef) -> Result<Option<Vec<Document>>> {
        if data_ref.backend != BACKEND {
            return Ok(None);
        }
        let batches = self
            .batches
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        Ok(batches.get(&data_ref.key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            content: format!("body {}", id),
            title: id.to_uppercase(),
            source: "confluence".to_string(),
            url: format!("https://x.net/{}", id),
            metadata: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_store_and_load_preserves_order() {
        let store = InMemoryStore::new();
        let r = store
            .store_documents(&[doc("b"), doc("a"), doc("c")])
            .await
            .unwrap();
        assert_eq!(r.backend, "memory");
        assert_eq!(r.count, 3);

        let loaded = store.load_documents(&r).await.unwrap().unwrap();
        let ids: Vec<&str> = loaded.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_empty_batch_is_stored() {
        let store = InMemoryStore::new();
        let r = store.store_documents(&[]).await.unwrap();
        assert_eq!(r.count, 0);
        assert_eq!(store.batch_count(), 1);
        assert_eq!(store.load_documents(&r).await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn test_unknown_reference() {
        let store = InMemoryStore::new();
        let missing = DataRef::new("memory", "nope", 0);
        assert!(store.load_documents(&missing).await.unwrap().is_none());
        let other = DataRef::new("sqlite", "nope", 0);
        assert!(store.load_documents(&other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_each_batch_gets_distinct_reference() {
        let store = InMemoryStore::new();
        let r1 = store.store_documents(&[doc("a")]).await.unwrap();
        let r2 = store.store_documents(&[doc("a")]).await.unwrap();
        assert_ne!(r1.key, r2.key);
        assert_eq!(store.batch_count(), 2);
    }
}
