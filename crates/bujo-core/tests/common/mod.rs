//! Test doubles shared by the integration scenarios.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bujo_core::db::Database;
use bujo_core::error::{Error, Result};
use bujo_core::models::{DomainEvent, ProjectionSnapshot};
use bujo_core::store::{
    DocumentQuery, DocumentStore, EventListener, EventStore, MemoryDocumentStore, SnapshotStore,
    SqliteEventStore,
};
use bujo_core::subscribers::Subscription;
use serde_json::Value;

pub fn sqlite_events() -> Arc<SqliteEventStore> {
    Arc::new(SqliteEventStore::new(Arc::new(
        Database::open_in_memory().unwrap(),
    )))
}

/// Event store wrapper that counts full and per-aggregate reads.
pub struct CountingEventStore {
    inner: Arc<dyn EventStore>,
    pub get_all_calls: AtomicUsize,
    pub get_by_id_calls: AtomicUsize,
    pub get_after_calls: AtomicUsize,
}

impl CountingEventStore {
    pub fn new(inner: Arc<dyn EventStore>) -> Self {
        Self {
            inner,
            get_all_calls: AtomicUsize::new(0),
            get_by_id_calls: AtomicUsize::new(0),
            get_after_calls: AtomicUsize::new(0),
        }
    }

    /// Reads that return the whole log or a whole aggregate.
    pub fn full_reads(&self) -> usize {
        self.get_all_calls.load(Ordering::SeqCst) + self.get_by_id_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventStore for CountingEventStore {
    async fn append(&self, event: &DomainEvent) -> Result<()> {
        self.inner.append(event).await
    }

    async fn append_batch(&self, events: &[DomainEvent]) -> Result<()> {
        self.inner.append_batch(events).await
    }

    async fn get_all(&self) -> Result<Vec<DomainEvent>> {
        self.get_all_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_all().await
    }

    async fn get_by_id(&self, aggregate_id: &str) -> Result<Vec<DomainEvent>> {
        self.get_by_id_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_id(aggregate_id).await
    }

    async fn get_after(&self, event_id: &str) -> Result<Vec<DomainEvent>> {
        self.get_after_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_after(event_id).await
    }

    fn subscribe(&self, listener: EventListener) -> Subscription {
        self.inner.subscribe(listener)
    }
}

/// In-memory document store that counts listings and can delay them.
pub struct CountingDocumentStore {
    inner: MemoryDocumentStore,
    delay: Duration,
    pub list_calls: AtomicUsize,
}

impl CountingDocumentStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryDocumentStore::new(),
            delay,
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for CountingDocumentStore {
    async fn set(&self, path: &str, document: Value) -> Result<()> {
        self.inner.set(path, document).await
    }

    async fn set_batch(&self, documents: Vec<(String, Value)>) -> Result<()> {
        self.inner.set_batch(documents).await
    }

    async fn get(&self, path: &str) -> Result<Option<Value>> {
        self.inner.get(path).await
    }

    async fn list(&self, collection: &str, query: &DocumentQuery) -> Result<Vec<Value>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.list(collection, query).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.inner.delete(path).await
    }
}

/// Document store whose reads never resolve.
pub struct HangingDocumentStore;

#[async_trait]
impl DocumentStore for HangingDocumentStore {
    async fn set(&self, _path: &str, _document: Value) -> Result<()> {
        std::future::pending().await
    }

    async fn get(&self, _path: &str) -> Result<Option<Value>> {
        std::future::pending().await
    }

    async fn list(&self, _collection: &str, _query: &DocumentQuery) -> Result<Vec<Value>> {
        std::future::pending().await
    }

    async fn delete(&self, _path: &str) -> Result<()> {
        std::future::pending().await
    }
}

/// Snapshot store that fails every call.
pub struct FailingSnapshotStore;

#[async_trait]
impl SnapshotStore for FailingSnapshotStore {
    async fn save(&self, _key: &str, _snapshot: &ProjectionSnapshot) -> Result<()> {
        Err(Error::Network("remote unavailable".to_string()))
    }

    async fn load(&self, _key: &str) -> Result<Option<ProjectionSnapshot>> {
        Err(Error::Network("remote unavailable".to_string()))
    }

    async fn clear(&self, _key: &str) -> Result<()> {
        Err(Error::Network("remote unavailable".to_string()))
    }
}

/// Snapshot store whose loads never resolve.
pub struct HangingSnapshotStore;

#[async_trait]
impl SnapshotStore for HangingSnapshotStore {
    async fn save(&self, _key: &str, _snapshot: &ProjectionSnapshot) -> Result<()> {
        std::future::pending().await
    }

    async fn load(&self, _key: &str) -> Result<Option<ProjectionSnapshot>> {
        std::future::pending().await
    }

    async fn clear(&self, _key: &str) -> Result<()> {
        std::future::pending().await
    }
}

/// Snapshot store wrapper that counts successful saves.
pub struct CountingSnapshotStore {
    inner: Arc<dyn SnapshotStore>,
    pub saves: AtomicUsize,
}

impl CountingSnapshotStore {
    pub fn new(inner: Arc<dyn SnapshotStore>) -> Self {
        Self {
            inner,
            saves: AtomicUsize::new(0),
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotStore for CountingSnapshotStore {
    async fn initialize(&self) -> Result<()> {
        self.inner.initialize().await
    }

    async fn save(&self, key: &str, snapshot: &ProjectionSnapshot) -> Result<()> {
        self.inner.save(key, snapshot).await?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<ProjectionSnapshot>> {
        self.inner.load(key).await
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.inner.clear(key).await
    }
}
