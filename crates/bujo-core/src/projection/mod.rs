//! Read models derived from the event log
//!
//! A `Projection<R>` folds events through a reducer `R` in append order.
//! Every folded event id is remembered, so re-delivering an event (tail
//! replay over an adopted snapshot, or hydrate racing the live
//! subscription) is a no-op.

mod collection_list;
mod entry_list;
mod preferences;
mod task_list;

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use collection_list::{effective_completed_task_behavior, CollectionList};
pub use entry_list::EntryList;
pub use preferences::UserPreferencesState;
pub use task_list::TaskList;

use crate::error::Result;
use crate::models::{DomainEvent, ProjectionSnapshot};
use crate::store::{EventStore, SnapshotStore};
use crate::subscribers::{Subscribers, Subscription};
use crate::util::now_iso;

pub type EntryListProjection = Projection<EntryList>;
pub type TaskListProjection = Projection<TaskList>;
pub type CollectionListProjection = Projection<CollectionList>;
pub type UserPreferencesProjection = Projection<UserPreferencesState>;

/// Pure fold over domain events.
pub trait Reducer: Default + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Logical snapshot name
    const SNAPSHOT_KEY: &'static str;
    /// Bumped whenever the serialized state shape changes
    const SNAPSHOT_VERSION: u32;

    /// Fold one event. Returns true when queryable state changed.
    fn apply(&mut self, event: &DomainEvent) -> bool;
}

/// Anything the snapshot manager and cold-start reconciliation can persist.
#[async_trait]
pub trait Snapshotable: Send + Sync + 'static {
    fn snapshot_key(&self) -> &str;

    /// Serialize current state; `None` before any event was folded.
    fn create_snapshot(&self) -> Result<Option<ProjectionSnapshot>>;

    /// Rebuild from the local snapshot store and event log.
    async fn hydrate(&self) -> Result<()>;

    /// Replace state with `snapshot`, then fold the tail after it.
    async fn hydrate_from_snapshot(&self, snapshot: ProjectionSnapshot) -> Result<()>;
}

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Folded<R> {
    state: R,
    seen_event_ids: BTreeSet<String>,
    #[serde(skip)]
    last_event_id: Option<String>,
}

impl<R: Reducer> Folded<R> {
    fn fold(&mut self, event: &DomainEvent) -> bool {
        if !self.seen_event_ids.insert(event.id.clone()) {
            return false;
        }
        self.last_event_id = Some(event.id.clone());
        self.state.apply(event)
    }

    fn restore(snapshot: &ProjectionSnapshot) -> Option<Self> {
        if snapshot.version != R::SNAPSHOT_VERSION {
            tracing::info!(
                key = R::SNAPSHOT_KEY,
                found = snapshot.version,
                expected = R::SNAPSHOT_VERSION,
                "Ignoring snapshot with stale version"
            );
            return None;
        }
        match serde_json::from_value::<Self>(snapshot.state.clone()) {
            Ok(mut folded) => {
                folded.last_event_id = Some(snapshot.last_event_id.clone());
                Some(folded)
            }
            Err(error) => {
                tracing::warn!(key = R::SNAPSHOT_KEY, "Ignoring unreadable snapshot: {error}");
                None
            }
        }
    }
}

/// A read model kept current by folding the event log.
pub struct Projection<R: Reducer> {
    folded: RwLock<Folded<R>>,
    /// Live events seen while a hydrate is reading the log
    buffered: Mutex<Option<Vec<DomainEvent>>>,
    events: Arc<dyn EventStore>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    subscribers: Subscribers<()>,
}

impl<R: Reducer> Projection<R> {
    pub fn new(events: Arc<dyn EventStore>) -> Self {
        Self {
            folded: RwLock::new(Folded::default()),
            buffered: Mutex::new(None),
            events,
            snapshots: None,
            subscribers: Subscribers::new(),
        }
    }

    /// Load snapshots from `snapshots` during `hydrate()`.
    #[must_use]
    pub fn with_snapshot_store(mut self, snapshots: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Fold every future append on the event store into this projection.
    pub fn attach(self: &Arc<Self>) -> Subscription {
        let projection: Weak<Self> = Arc::downgrade(self);
        self.events.subscribe(Box::new(move |event: &DomainEvent| {
            if let Some(projection) = projection.upgrade() {
                projection.apply(event);
            }
        }))
    }

    /// Fires after each fold that changed queryable state.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.subscribers.subscribe(move |_: &()| callback())
    }

    /// Fold a single event. Returns true when queryable state changed.
    pub fn apply(&self, event: &DomainEvent) -> bool {
        let changed = {
            let mut folded = self.folded.write();
            if let Some(buffer) = self.buffered.lock().as_mut() {
                buffer.push(event.clone());
            }
            folded.fold(event)
        };
        if changed {
            self.subscribers.notify(&());
        }
        changed
    }

    /// Drop all in-memory state.
    pub fn reset(&self) {
        *self.folded.write() = Folded::default();
    }

    /// Rebuild from the latest local snapshot plus the events after it,
    /// or from the full log when there is no usable snapshot.
    pub async fn hydrate(&self) -> Result<()> {
        self.begin_replay();

        let snapshot = match &self.snapshots {
            Some(store) => match store.load(R::SNAPSHOT_KEY).await {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    self.buffered.lock().take();
                    return Err(error);
                }
            },
            None => None,
        };
        let restored = snapshot.as_ref().and_then(Folded::<R>::restore);
        self.replace_and_replay(restored).await
    }

    fn begin_replay(&self) {
        let mut folded = self.folded.write();
        *folded = Folded::default();
        *self.buffered.lock() = Some(Vec::new());
    }

    async fn replace_and_replay(&self, restored: Option<Folded<R>>) -> Result<()> {
        let read = self.read_tail(restored).await;
        let (mut folded, tail) = match read {
            Ok(read) => read,
            Err(error) => {
                self.buffered.lock().take();
                return Err(error);
            }
        };

        let replayed = tail.len();
        for event in &tail {
            folded.fold(event);
        }

        {
            let mut current = self.folded.write();
            let live = self.buffered.lock().take().unwrap_or_default();
            if !live.is_empty() {
                tracing::debug!(count = live.len(), "Folding events that arrived during hydrate");
            }
            for event in &live {
                folded.fold(event);
            }
            tracing::debug!(
                key = R::SNAPSHOT_KEY,
                replayed,
                total = folded.seen_event_ids.len(),
                "Projection hydrated"
            );
            *current = folded;
        }
        self.subscribers.notify(&());
        Ok(())
    }

    async fn read_tail(&self, restored: Option<Folded<R>>) -> Result<(Folded<R>, Vec<DomainEvent>)> {
        match restored {
            Some(folded) => {
                let after = folded.last_event_id.clone().unwrap_or_default();
                let tail = self.events.get_after(&after).await?;
                Ok((folded, tail))
            }
            None => Ok((Folded::default(), self.events.get_all().await?)),
        }
    }

    /// Read current state.
    pub fn read<T>(&self, query: impl FnOnce(&R) -> T) -> T {
        query(&self.folded.read().state)
    }

    /// Number of distinct events folded so far.
    pub fn processed_count(&self) -> usize {
        self.folded.read().seen_event_ids.len()
    }

    pub fn last_event_id(&self) -> Option<String> {
        self.folded.read().last_event_id.clone()
    }
}

#[async_trait]
impl<R: Reducer> Snapshotable for Projection<R> {
    fn snapshot_key(&self) -> &str {
        R::SNAPSHOT_KEY
    }

    fn create_snapshot(&self) -> Result<Option<ProjectionSnapshot>> {
        let folded = self.folded.read();
        let Some(last_event_id) = folded.last_event_id.clone() else {
            return Ok(None);
        };
        Ok(Some(ProjectionSnapshot {
            version: R::SNAPSHOT_VERSION,
            last_event_id,
            state: serde_json::to_value(&*folded)?,
            saved_at: now_iso(),
        }))
    }

    async fn hydrate(&self) -> Result<()> {
        Self::hydrate(self).await
    }

    async fn hydrate_from_snapshot(&self, snapshot: ProjectionSnapshot) -> Result<()> {
        self.begin_replay();
        let restored = Folded::<R>::restore(&snapshot);
        self.replace_and_replay(restored).await
    }
}
