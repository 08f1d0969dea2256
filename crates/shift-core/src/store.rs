//! Persistence collaborator
//!
//! A keyed `get`/`put` abstraction for flows and produced agents. The
//! orchestrator assumes nothing about the backing technology.

use crate::error::StoreError;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// Key-value record store
#[async_trait::async_trait]
pub trait Store<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Fetch a record; `Ok(None)` when absent
    ///
    /// # Errors
    /// Returns [`StoreError`] if the backend fails.
    async fn get(&self, id: &str) -> Result<Option<T>, StoreError>;

    /// Insert or replace a record
    ///
    /// # Errors
    /// Returns [`StoreError`] if the backend fails.
    async fn put(&self, id: &str, record: T) -> Result<(), StoreError>;
}

/// Concurrent in-memory store
///
/// Clones share the same map.
#[derive(Debug)]
pub struct MemoryStore<T> {
    records: Arc<DashMap<String, T>>,
}

impl<T> MemoryStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
        }
    }

    /// Number of stored records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stored identifiers, unordered
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.records.iter().map(|e| e.key().clone()).collect()
    }
}

impl<T> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<T> Store<T> for MemoryStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn put(&self, id: &str, record: T) -> Result<(), StoreError> {
        self.records.insert(id.to_string(), record);
        Ok(())
    }
}

/// In-memory store that keeps records as JSON documents
///
/// Every `put` encodes and every `get` decodes, so records go through the
/// same validation a file or network backend would apply. Clones share
/// the same map.
#[derive(Debug)]
pub struct JsonStore<T> {
    documents: Arc<DashMap<String, String>>,
    _record: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: Arc::new(DashMap::new()),
            _record: PhantomData,
        }
    }

    /// Raw document stored under `id`
    #[must_use]
    pub fn document(&self, id: &str) -> Option<String> {
        self.documents.get(id).map(|d| d.value().clone())
    }

    /// Replace the raw document stored under `id`
    pub fn put_document(&self, id: &str, document: impl Into<String>) {
        self.documents.insert(id.to_string(), document.into());
    }
}

impl<T> Clone for JsonStore<T> {
    fn clone(&self) -> Self {
        Self {
            documents: Arc::clone(&self.documents),
            _record: PhantomData,
        }
    }
}

impl<T> Default for JsonStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<T> Store<T> for JsonStore<T>
where
    T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    async fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        let Some(document) = self.document(id) else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&document)?))
    }

    async fn put(&self, id: &str, record: T) -> Result<(), StoreError> {
        let document = serde_json::to_string(&record)?;
        self.documents.insert(id.to_string(), document);
        Ok(())
    }
}

/// Fetch a record that must exist
///
/// # Errors
/// Returns [`StoreError::NotFound`] when absent.
pub async fn require<T, S>(store: &S, id: &str) -> Result<T, StoreError>
where
    T: Clone + Send + Sync + 'static,
    S: Store<T> + ?Sized,
{
    store
        .get(id)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let store: MemoryStore<String> = MemoryStore::new();
        assert!(store.get("a").await.unwrap().is_none());

        store.put("a", "first".to_string()).await.unwrap();
        store.put("a", "second".to_string()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn clones_share_records() {
        let store: MemoryStore<u32> = MemoryStore::new();
        let other = store.clone();
        other.put("x", 7).await.unwrap();
        assert_eq!(store.get("x").await.unwrap(), Some(7));
        assert_eq!(store.ids(), vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn require_reports_missing() {
        let store: MemoryStore<u32> = MemoryStore::new();
        let err = require(&store, "missing").await.unwrap_err();
        assert_eq!(err, StoreError::NotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn json_store_round_trips() {
        let store: JsonStore<Vec<u32>> = JsonStore::new();
        store.put("a", vec![1, 2, 3]).await.unwrap();
        assert_eq!(store.document("a").as_deref(), Some("[1,2,3]"));
        assert_eq!(store.clone().get("a").await.unwrap(), Some(vec![1, 2, 3]));
        assert!(store.get("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn json_store_reports_undecodable_documents() {
        let store: JsonStore<Vec<u32>> = JsonStore::new();
        store.put_document("a", "{\"not\": \"a list\"}");
        let err = store.get("a").await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
