//! Remote event and snapshot stores on top of a document database
//!
//! Layout per user:
//! - `users/{userId}/events/{eventId}`
//! - `users/{userId}/snapshots/{key}`

use std::sync::Arc;

use async_trait::async_trait;

use super::document::{strip_nulls, DocumentQuery, DocumentStore};
use super::{EventListener, EventStore, SnapshotStore};
use crate::error::Result;
use crate::models::{DomainEvent, ProjectionSnapshot};
use crate::subscribers::{Subscribers, Subscription};

fn events_collection(user_id: &str) -> String {
    format!("users/{user_id}/events")
}

fn snapshots_collection(user_id: &str) -> String {
    format!("users/{user_id}/snapshots")
}

/// Per-user event log in the remote document store.
///
/// Events are upserted by id, so re-uploading an event is harmless.
pub struct RemoteEventStore {
    documents: Arc<dyn DocumentStore>,
    user_id: String,
    subscribers: Subscribers<DomainEvent>,
}

impl RemoteEventStore {
    pub fn new(documents: Arc<dyn DocumentStore>, user_id: impl Into<String>) -> Self {
        Self {
            documents,
            user_id: user_id.into(),
            subscribers: Subscribers::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn event_path(&self, event_id: &str) -> String {
        format!("{}/{event_id}", events_collection(&self.user_id))
    }

    async fn list(&self, query: &DocumentQuery) -> Result<Vec<DomainEvent>> {
        let documents = self
            .documents
            .list(&events_collection(&self.user_id), query)
            .await?;

        let mut events = Vec::with_capacity(documents.len());
        for document in documents {
            match serde_json::from_value::<DomainEvent>(document) {
                Ok(event) => events.push(event),
                Err(error) => tracing::warn!("Skipping unreadable remote event: {error}"),
            }
        }
        // The store sorts by timestamp; ids break ties deterministically.
        events.sort_by(|left, right| {
            left.timestamp
                .cmp(&right.timestamp)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(events)
    }

    /// Events whose timestamp is strictly greater than `timestamp`.
    pub async fn get_since(&self, timestamp: &str) -> Result<Vec<DomainEvent>> {
        self.list(
            &DocumentQuery::all()
                .where_greater_than("timestamp", timestamp)
                .order_by("timestamp"),
        )
        .await
    }
}

#[async_trait]
impl EventStore for RemoteEventStore {
    async fn append(&self, event: &DomainEvent) -> Result<()> {
        let document = strip_nulls(serde_json::to_value(event)?);
        self.documents
            .set(&self.event_path(&event.id), document)
            .await?;
        self.subscribers.notify(event);
        Ok(())
    }

    async fn append_batch(&self, events: &[DomainEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut writes = Vec::with_capacity(events.len());
        for event in events {
            writes.push((
                self.event_path(&event.id),
                strip_nulls(serde_json::to_value(event)?),
            ));
        }
        self.documents.set_batch(writes).await?;

        for event in events {
            self.subscribers.notify(event);
        }
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<DomainEvent>> {
        self.list(&DocumentQuery::all().order_by("timestamp")).await
    }

    async fn get_by_id(&self, aggregate_id: &str) -> Result<Vec<DomainEvent>> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|event| event.aggregate_id == aggregate_id)
            .collect())
    }

    fn subscribe(&self, listener: EventListener) -> Subscription {
        self.subscribers.subscribe(listener)
    }
}

/// Per-user snapshot documents in the remote document store.
pub struct RemoteSnapshotStore {
    documents: Arc<dyn DocumentStore>,
    user_id: String,
}

impl RemoteSnapshotStore {
    pub fn new(documents: Arc<dyn DocumentStore>, user_id: impl Into<String>) -> Self {
        Self {
            documents,
            user_id: user_id.into(),
        }
    }

    fn snapshot_path(&self, key: &str) -> String {
        format!("{}/{key}", snapshots_collection(&self.user_id))
    }
}

#[async_trait]
impl SnapshotStore for RemoteSnapshotStore {
    async fn save(&self, key: &str, snapshot: &ProjectionSnapshot) -> Result<()> {
        let document = strip_nulls(serde_json::to_value(snapshot)?);
        self.documents.set(&self.snapshot_path(key), document).await
    }

    async fn load(&self, key: &str) -> Result<Option<ProjectionSnapshot>> {
        let Some(document) = self.documents.get(&self.snapshot_path(key)).await? else {
            return Ok(None);
        };
        match serde_json::from_value(document) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(error) => {
                tracing::warn!("Discarding unreadable remote snapshot {key}: {error}");
                Ok(None)
            }
        }
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.documents.delete(&self.snapshot_path(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventPayload;
    use crate::store::MemoryDocumentStore;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn created(task_id: &str, timestamp: &str) -> DomainEvent {
        DomainEvent::new(EventPayload::TaskCreated {
            task_id: task_id.to_string(),
            title: format!("Task {task_id}"),
            collection_id: None,
            parent_task_id: None,
            order: None,
        })
        .at(timestamp)
    }

    fn setup() -> (Arc<MemoryDocumentStore>, RemoteEventStore) {
        let documents = Arc::new(MemoryDocumentStore::new());
        let store = RemoteEventStore::new(documents.clone(), "u1");
        (documents, store)
    }

    #[tokio::test]
    async fn append_strips_nulls_and_round_trips() {
        let (documents, store) = setup();
        let event = created("t1", "2024-01-01T00:00:00.000Z");
        store.append(&event).await.unwrap();

        let raw = documents
            .get(&format!("users/u1/events/{}", event.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw["payload"].get("collectionId"), None);
        assert_eq!(store.get_all().await.unwrap(), vec![event]);
    }

    #[tokio::test]
    async fn get_all_orders_by_timestamp_then_id() {
        let (_documents, store) = setup();
        let late = created("a", "2024-01-02T00:00:00.000Z").with_id("e-3");
        let tie_b = created("b", "2024-01-01T00:00:00.000Z").with_id("e-2");
        let tie_a = created("c", "2024-01-01T00:00:00.000Z").with_id("e-1");
        store
            .append_batch(&[late.clone(), tie_b.clone(), tie_a.clone()])
            .await
            .unwrap();

        assert_eq!(store.get_all().await.unwrap(), vec![tie_a, tie_b, late]);
    }

    #[tokio::test]
    async fn get_since_is_strictly_after() {
        let (_documents, store) = setup();
        let first = created("a", "2024-01-01T00:00:00.000Z");
        let second = created("b", "2024-01-02T00:00:00.000Z");
        store
            .append_batch(&[first.clone(), second.clone()])
            .await
            .unwrap();

        let since = store.get_since(&first.timestamp).await.unwrap();
        assert_eq!(since, vec![second]);
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let documents = Arc::new(MemoryDocumentStore::new());
        let mine = RemoteEventStore::new(documents.clone(), "u1");
        let theirs = RemoteEventStore::new(documents.clone(), "u2");
        mine.append(&created("a", "2024-01-01T00:00:00.000Z"))
            .await
            .unwrap();

        assert!(theirs.get_all().await.unwrap().is_empty());
        assert_eq!(mine.get_by_id("a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn append_notifies_subscribers() {
        let (_documents, store) = setup();
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        let _subscription = store.subscribe(Box::new(move |_event: &DomainEvent| {
            *sink.lock() += 1;
        }));

        store
            .append(&created("a", "2024-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        assert_eq!(*seen.lock(), 1);
    }

    #[tokio::test]
    async fn snapshot_store_save_load_clear() {
        let documents = Arc::new(MemoryDocumentStore::new());
        let store = RemoteSnapshotStore::new(documents.clone(), "u1");
        let snapshot = ProjectionSnapshot {
            version: 1,
            last_event_id: "e1".to_string(),
            state: json!({ "entries": [] }),
            saved_at: "2024-01-01T00:00:00.000Z".to_string(),
        };

        assert!(store.load("k").await.unwrap().is_none());
        store.save("k", &snapshot).await.unwrap();
        assert_eq!(documents.count("users/u1/snapshots"), 1);
        assert_eq!(store.load("k").await.unwrap(), Some(snapshot));

        store.clear("k").await.unwrap();
        assert!(store.load("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreadable_snapshot_is_discarded() {
        let documents = Arc::new(MemoryDocumentStore::new());
        documents
            .set("users/u1/snapshots/k", json!({ "garbage": true }))
            .await
            .unwrap();
        let store = RemoteSnapshotStore::new(documents, "u1");
        assert!(store.load("k").await.unwrap().is_none());
    }
}
