//! Document-store seam
//!
//! The document store is an external collaborator: a key-value store with
//! path-addressed JSON documents. Trigger logic never talks to it directly;
//! triggers produce [`WriteIntent`](crate::intent::WriteIntent)s and the
//! executor applies them through this trait.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;

/// Failures raised by a store backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or refused the operation
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

/// Path-addressed JSON document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the document at `path`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails; an absent document is
    /// `Ok(None)`.
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the document at `path`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn set(&self, path: &str, doc: Value) -> Result<(), StoreError>;

    /// Merge fields into the document at `path`, creating it if absent
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn merge(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Delete the document at `path` (absent documents are a no-op)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Whether a document exists at `path`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn exists(&self, path: &str) -> Result<bool, StoreError>;
}

/// In-memory store for tests and development
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.docs.read().await.get(path).cloned())
    }

    async fn set(&self, path: &str, doc: Value) -> Result<(), StoreError> {
        self.docs.write().await.insert(path.to_string(), doc);
        Ok(())
    }

    async fn merge(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let mut docs = self.docs.write().await;
        let entry = docs
            .entry(path.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(existing) = entry {
            for (key, value) in fields {
                existing.insert(key, value);
            }
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "document at '{path}' is not an object"
            )))
        }
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.docs.write().await.remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.docs.read().await.contains_key(path))
    }
}
