//! Event and snapshot stores
//!
//! Both come in a local (SQLite) and a remote (document store) flavor
//! behind one trait each, so projections, handlers and managers take
//! `Arc<dyn EventStore>` / `Arc<dyn SnapshotStore>` and never care which.

mod document;
mod http;
mod local_events;
mod local_snapshots;
mod remote;

use async_trait::async_trait;

pub use document::{strip_nulls, DocumentQuery, DocumentStore, MemoryDocumentStore};
pub use http::HttpDocumentStore;
pub use local_events::SqliteEventStore;
pub use local_snapshots::SqliteSnapshotStore;
pub use remote::{RemoteEventStore, RemoteSnapshotStore};

use crate::error::Result;
use crate::models::{DomainEvent, ProjectionSnapshot};
use crate::subscribers::Subscription;

/// Callback invoked once per appended event.
pub type EventListener = Box<dyn Fn(&DomainEvent) + Send + Sync>;

/// Append-only, per-aggregate-ordered event log.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist one event durably.
    async fn append(&self, event: &DomainEvent) -> Result<()>;

    /// Persist several events as a unit where the medium supports it.
    async fn append_batch(&self, events: &[DomainEvent]) -> Result<()>;

    /// Every event in append order.
    async fn get_all(&self) -> Result<Vec<DomainEvent>>;

    /// Events for one aggregate in append order.
    async fn get_by_id(&self, aggregate_id: &str) -> Result<Vec<DomainEvent>>;

    /// Events appended after `event_id`; the whole log if the id is unknown.
    async fn get_after(&self, event_id: &str) -> Result<Vec<DomainEvent>> {
        let events = self.get_all().await?;
        match events.iter().position(|event| event.id == event_id) {
            Some(index) => Ok(events.into_iter().skip(index + 1).collect()),
            None => Ok(events),
        }
    }

    /// Register a callback fired once per successful append.
    fn subscribe(&self, listener: EventListener) -> Subscription;
}

/// Keyed store for serialized projection state.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Open the underlying storage. Remote stores need no setup.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn save(&self, key: &str, snapshot: &ProjectionSnapshot) -> Result<()>;

    async fn load(&self, key: &str) -> Result<Option<ProjectionSnapshot>>;

    async fn clear(&self, key: &str) -> Result<()>;
}

/// Snapshot key of the entry list projection.
pub const ENTRY_LIST_SNAPSHOT_KEY: &str = "entry-list-projection";
pub const TASK_LIST_SNAPSHOT_KEY: &str = "task-list-projection";
pub const COLLECTION_LIST_SNAPSHOT_KEY: &str = "collection-list-projection";
pub const USER_PREFERENCES_SNAPSHOT_KEY: &str = "user-preferences-projection";
