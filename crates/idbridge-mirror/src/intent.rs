//! Write intents
//!
//! Trigger functions are pure: they map a document change to a list of
//! intended writes without touching the store. The executor below is the
//! only place intents turn into side effects, which keeps the trigger
//! logic unit-testable without a live document store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::store::{DocumentStore, StoreError};

/// A single intended write against the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteIntent {
    /// Replace the document at `path`
    Put {
        /// Target document path
        path: String,
        /// Full document body
        doc: Value,
    },
    /// Merge fields into the document at `path`
    Merge {
        /// Target document path
        path: String,
        /// Fields to merge
        fields: Map<String, Value>,
    },
    /// Delete the document at `path`
    Delete {
        /// Target document path
        path: String,
    },
}

impl WriteIntent {
    /// The path this intent targets
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Put { path, .. } | Self::Merge { path, .. } | Self::Delete { path } => path,
        }
    }
}

/// Apply intents to the store, in order
///
/// Stops at the first failing write; earlier intents stay applied (the
/// store's writes are independent documents, there is no transaction).
///
/// # Errors
///
/// Returns the [`StoreError`] of the first failing write.
pub async fn apply(store: &dyn DocumentStore, intents: &[WriteIntent]) -> Result<(), StoreError> {
    for intent in intents {
        debug!(path = intent.path(), "applying write intent");
        match intent {
            WriteIntent::Put { path, doc } => store.set(path, doc.clone()).await?,
            WriteIntent::Merge { path, fields } => store.merge(path, fields.clone()).await?,
            WriteIntent::Delete { path } => store.delete(path).await?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn intents_apply_in_order() {
        let store = MemoryStore::new();
        let mut fields = Map::new();
        fields.insert("y".to_string(), json!(2));

        let intents = vec![
            WriteIntent::Put {
                path: "a/1".to_string(),
                doc: json!({"x": 1}),
            },
            WriteIntent::Merge {
                path: "a/1".to_string(),
                fields,
            },
            WriteIntent::Delete {
                path: "a/2".to_string(),
            },
        ];
        apply(&store, &intents).await.unwrap();

        assert_eq!(store.get("a/1").await.unwrap(), Some(json!({"x": 1, "y": 2})));
        assert!(!store.exists("a/2").await.unwrap());
    }
}
