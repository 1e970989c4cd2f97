//! Remote document store abstraction
//!
//! Documents are JSON objects addressed by slash-separated paths, e.g.
//! `users/{userId}/events/{eventId}`. A collection path lists its direct
//! children.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::Result;

/// Filter and ordering for collection listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentQuery {
    /// Only documents whose string `field` is strictly greater than the value
    pub greater_than: Option<(String, String)>,
    /// Field to sort ascending by (document path breaks ties)
    pub order_by: Option<String>,
}

impl DocumentQuery {
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn where_greater_than(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.greater_than = Some((field.into(), value.into()));
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// Evaluate the filter against a document.
    pub fn matches(&self, document: &Value) -> bool {
        let Some((field, value)) = &self.greater_than else {
            return true;
        };
        document
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|actual| actual > value.as_str())
    }
}

/// Minimal document database interface used by the remote stores.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or overwrite the document at `path`.
    async fn set(&self, path: &str, document: Value) -> Result<()>;

    /// Write several documents; implementations may make this atomic.
    async fn set_batch(&self, documents: Vec<(String, Value)>) -> Result<()> {
        for (path, document) in documents {
            self.set(&path, document).await?;
        }
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Value>>;

    /// Direct children of `collection` matching `query`.
    async fn list(&self, collection: &str, query: &DocumentQuery) -> Result<Vec<Value>>;

    async fn delete(&self, path: &str) -> Result<()>;
}

/// Recursively remove `null` object members.
///
/// Remote documents reject absent values, so optional fields that serialize
/// as `null` are dropped before every write.
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, member)| !member.is_null())
                .map(|(key, member)| (key, strip_nulls(member)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

/// In-process document store, used for tests and offline demos.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<BTreeMap<String, Value>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents under `collection`.
    pub fn count(&self, collection: &str) -> usize {
        let prefix = format!("{}/", collection.trim_end_matches('/'));
        self.documents
            .lock()
            .keys()
            .filter(|path| is_direct_child(path, &prefix))
            .count()
    }
}

fn is_direct_child(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn set(&self, path: &str, document: Value) -> Result<()> {
        self.documents.lock().insert(path.to_string(), document);
        Ok(())
    }

    async fn set_batch(&self, documents: Vec<(String, Value)>) -> Result<()> {
        let mut stored = self.documents.lock();
        for (path, document) in documents {
            stored.insert(path, document);
        }
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Value>> {
        Ok(self.documents.lock().get(path).cloned())
    }

    async fn list(&self, collection: &str, query: &DocumentQuery) -> Result<Vec<Value>> {
        let prefix = format!("{}/", collection.trim_end_matches('/'));
        let mut matched: Vec<(String, Value)> = self
            .documents
            .lock()
            .iter()
            .filter(|(path, document)| is_direct_child(path, &prefix) && query.matches(document))
            .map(|(path, document)| (path.clone(), document.clone()))
            .collect();

        if let Some(field) = &query.order_by {
            matched.sort_by(|(left_path, left), (right_path, right)| {
                let left_key = left.get(field).and_then(Value::as_str).unwrap_or_default();
                let right_key = right.get(field).and_then(Value::as_str).unwrap_or_default();
                left_key
                    .cmp(right_key)
                    .then_with(|| left_path.cmp(right_path))
            });
        }

        Ok(matched.into_iter().map(|(_, document)| document).collect())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.documents.lock().remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn strip_nulls_is_recursive() {
        let raw = json!({
            "id": "e1",
            "payload": { "taskId": "t1", "collectionId": null, "nested": { "x": null, "y": 1 } },
            "list": [{ "a": null, "b": 2 }],
            "gone": null
        });
        assert_eq!(
            strip_nulls(raw),
            json!({
                "id": "e1",
                "payload": { "taskId": "t1", "nested": { "y": 1 } },
                "list": [{ "b": 2 }]
            })
        );
    }

    #[tokio::test]
    async fn list_returns_direct_children_only() {
        let store = MemoryDocumentStore::new();
        store.set("users/u1/events/a", json!({"t": "2"})).await.unwrap();
        store.set("users/u1/events/b", json!({"t": "1"})).await.unwrap();
        store.set("users/u1/events/b/extra/c", json!({})).await.unwrap();
        store.set("users/u2/events/a", json!({})).await.unwrap();

        let listed = store
            .list("users/u1/events", &DocumentQuery::all().order_by("t"))
            .await
            .unwrap();
        assert_eq!(listed, vec![json!({"t": "1"}), json!({"t": "2"})]);
        assert_eq!(store.count("users/u1/events"), 2);
    }

    #[tokio::test]
    async fn list_applies_greater_than_filter() {
        let store = MemoryDocumentStore::new();
        store.set("c/a", json!({"timestamp": "2024-01-01"})).await.unwrap();
        store.set("c/b", json!({"timestamp": "2024-02-01"})).await.unwrap();

        let query = DocumentQuery::all().where_greater_than("timestamp", "2024-01-01");
        let listed = store.list("c", &query).await.unwrap();
        assert_eq!(listed, vec![json!({"timestamp": "2024-02-01"})]);
    }

    #[tokio::test]
    async fn set_overwrites_and_delete_removes() {
        let store = MemoryDocumentStore::new();
        store.set("c/a", json!({"v": 1})).await.unwrap();
        store.set("c/a", json!({"v": 2})).await.unwrap();
        assert_eq!(store.get("c/a").await.unwrap(), Some(json!({"v": 2})));

        store.delete("c/a").await.unwrap();
        assert_eq!(store.get("c/a").await.unwrap(), None);
    }
}
