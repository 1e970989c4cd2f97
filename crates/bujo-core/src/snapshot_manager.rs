//! Snapshot manager: decides when a projection is persisted.
//!
//! Three triggers feed one save path:
//! - every `event_threshold` appended events
//! - the host going hidden
//! - unload
//!
//! A successful save from any trigger resets the event counter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::SnapshotSettings;
use crate::error::{Error, Result};
use crate::lifecycle::{Lifecycle, LifecycleEvent, Visibility};
use crate::models::DomainEvent;
use crate::projection::Snapshotable;
use crate::store::{EventStore, SnapshotStore};
use crate::subscribers::Subscription;

/// What asked for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotTrigger {
    Count,
    Visibility,
    Unload,
    Manual,
}

impl SnapshotTrigger {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Visibility => "visibility",
            Self::Unload => "unload",
            Self::Manual => "manual",
        }
    }
}

struct Inner<P: Snapshotable + ?Sized> {
    projection: Arc<P>,
    local: Arc<dyn SnapshotStore>,
    remote: Option<Arc<dyn SnapshotStore>>,
    threshold: usize,
    counter: AtomicUsize,
    /// Saves started from listeners, so shutdown can wait for them
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl<P: Snapshotable + ?Sized> Inner<P> {
    async fn save(&self, trigger: SnapshotTrigger) -> bool {
        let key = self.projection.snapshot_key().to_string();
        let snapshot = match self.projection.create_snapshot() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::debug!(%key, trigger = trigger.as_str(), "Nothing to snapshot yet");
                return false;
            }
            Err(error) => {
                tracing::warn!(%key, trigger = trigger.as_str(), "Failed to build snapshot: {error}");
                return false;
            }
        };

        if let Err(error) = self.local.save(&key, &snapshot).await {
            tracing::warn!(%key, trigger = trigger.as_str(), "Failed to save snapshot: {error}");
            return false;
        }
        self.counter.store(0, Ordering::SeqCst);
        tracing::debug!(
            %key,
            trigger = trigger.as_str(),
            last_event_id = %snapshot.last_event_id,
            "Snapshot saved"
        );

        if let Some(remote) = self.remote.clone() {
            tokio::spawn(async move {
                if let Err(error) = remote.save(&key, &snapshot).await {
                    tracing::warn!(%key, "Remote snapshot mirror failed: {error}");
                }
            });
        }
        true
    }

    fn spawn_save(self: &Arc<Self>, runtime: &Handle, trigger: SnapshotTrigger)
    where
        P: 'static,
    {
        let inner = Arc::clone(self);
        let task = runtime.spawn(async move {
            inner.save(trigger).await;
        });
        let mut pending = self.pending.lock();
        pending.retain(|task| !task.is_finished());
        pending.push(task);
    }

    fn record_event(self: &Arc<Self>, runtime: &Handle)
    where
        P: 'static,
    {
        let count = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.threshold {
            self.counter.store(0, Ordering::SeqCst);
            self.spawn_save(runtime, SnapshotTrigger::Count);
        }
    }
}

/// Persists one projection's snapshots locally, mirroring them remotely
/// when a remote store is configured.
pub struct SnapshotManager<P: Snapshotable + ?Sized> {
    inner: Arc<Inner<P>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl<P: Snapshotable + ?Sized> SnapshotManager<P> {
    pub fn new(
        projection: Arc<P>,
        local: Arc<dyn SnapshotStore>,
        remote: Option<Arc<dyn SnapshotStore>>,
        settings: SnapshotSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                projection,
                local,
                remote,
                threshold: settings.event_threshold.max(1),
                counter: AtomicUsize::new(0),
                pending: Mutex::new(Vec::new()),
            }),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Attach the count, visibility and unload triggers.
    ///
    /// Must be called from inside a tokio runtime; saves are spawned on it.
    pub fn start(&self, events: &dyn EventStore, lifecycle: &Lifecycle) -> Result<()>
    where
        P: 'static,
    {
        let runtime = Handle::try_current().map_err(|error| {
            Error::InvalidInput(format!("snapshot manager needs a tokio runtime: {error}"))
        })?;
        let mut subscriptions = self.subscriptions.lock();
        if !subscriptions.is_empty() {
            return Ok(());
        }

        let inner: Weak<Inner<P>> = Arc::downgrade(&self.inner);
        let handle = runtime.clone();
        subscriptions.push(events.subscribe(Box::new(move |_: &DomainEvent| {
            if let Some(inner) = inner.upgrade() {
                inner.record_event(&handle);
            }
        })));

        let inner: Weak<Inner<P>> = Arc::downgrade(&self.inner);
        subscriptions.push(lifecycle.subscribe(move |event: &LifecycleEvent| {
            let trigger = match event {
                LifecycleEvent::VisibilityChanged(Visibility::Hidden) => SnapshotTrigger::Visibility,
                LifecycleEvent::Unload => SnapshotTrigger::Unload,
                _ => return,
            };
            if let Some(inner) = inner.upgrade() {
                inner.spawn_save(&runtime, trigger);
            }
        }));

        tracing::debug!(
            key = self.inner.projection.snapshot_key(),
            threshold = self.inner.threshold,
            "Snapshot manager started"
        );
        Ok(())
    }

    /// Detach every trigger. No trigger fires once this returns.
    pub fn stop(&self) {
        let subscriptions: Vec<Subscription> = std::mem::take(&mut *self.subscriptions.lock());
        if subscriptions.is_empty() {
            return;
        }
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        tracing::debug!(key = self.inner.projection.snapshot_key(), "Snapshot manager stopped");
    }

    /// Save now. Returns whether a snapshot was persisted locally.
    pub async fn save_snapshot(&self, trigger: SnapshotTrigger) -> bool {
        self.inner.save(trigger).await
    }

    /// Wait for saves started by triggers to finish.
    pub async fn flush(&self) {
        let pending: Vec<JoinHandle<()>> = std::mem::take(&mut *self.inner.pending.lock());
        for task in pending {
            if let Err(error) = task.await {
                tracing::warn!("Snapshot save task failed: {error}");
            }
        }
    }

    /// Events appended since the last successful save.
    pub fn pending_events(&self) -> usize {
        self.inner.counter.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        !self.subscriptions.lock().is_empty()
    }
}

impl<P: Snapshotable + ?Sized> Drop for SnapshotManager<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{EventPayload, ProjectionSnapshot};
    use crate::projection::EntryListProjection;
    use crate::store::{SqliteEventStore, SqliteSnapshotStore, ENTRY_LIST_SNAPSHOT_KEY};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Counts saves and can be told to fail.
    #[derive(Default)]
    struct SpyStore {
        saves: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SnapshotStore for SpyStore {
        async fn save(&self, _key: &str, _snapshot: &ProjectionSnapshot) -> Result<()> {
            if self.fail {
                return Err(Error::Storage("quota exceeded".to_string()));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn load(&self, _key: &str) -> Result<Option<ProjectionSnapshot>> {
            Ok(None)
        }

        async fn clear(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    struct Setup {
        events: Arc<SqliteEventStore>,
        projection: Arc<EntryListProjection>,
        _attached: Subscription,
    }

    fn setup() -> Setup {
        let events = Arc::new(SqliteEventStore::new(Arc::new(
            Database::open_in_memory().unwrap(),
        )));
        let projection = Arc::new(EntryListProjection::new(events.clone()));
        let attached = projection.attach();
        Setup {
            events,
            projection,
            _attached: attached,
        }
    }

    fn created(n: usize) -> DomainEvent {
        DomainEvent::new(EventPayload::TaskCreated {
            task_id: format!("t{n}"),
            title: format!("task {n}"),
            collection_id: None,
            parent_task_id: None,
            order: None,
        })
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn threshold(event_threshold: usize) -> SnapshotSettings {
        SnapshotSettings { event_threshold }
    }

    #[tokio::test(start_paused = true)]
    async fn count_trigger_fires_once_at_threshold() {
        let setup = setup();
        let spy = Arc::new(SpyStore::default());
        let manager = SnapshotManager::new(setup.projection.clone(), spy.clone(), None, threshold(3));
        let lifecycle = Lifecycle::new();
        manager.start(setup.events.as_ref(), &lifecycle).unwrap();

        setup.events.append(&created(1)).await.unwrap();
        setup.events.append(&created(2)).await.unwrap();
        settle().await;
        assert_eq!(spy.saves.load(Ordering::SeqCst), 0);

        setup.events.append(&created(3)).await.unwrap();
        settle().await;
        assert_eq!(spy.saves.load(Ordering::SeqCst), 1);
        assert_eq!(manager.pending_events(), 0);

        setup.events.append(&created(4)).await.unwrap();
        settle().await;
        assert_eq!(spy.saves.load(Ordering::SeqCst), 1);
        assert_eq!(manager.pending_events(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_and_unload_save_immediately_and_reset_counter() {
        let setup = setup();
        let spy = Arc::new(SpyStore::default());
        let manager = SnapshotManager::new(setup.projection.clone(), spy.clone(), None, threshold(50));
        let lifecycle = Lifecycle::new();
        manager.start(setup.events.as_ref(), &lifecycle).unwrap();

        setup.events.append(&created(1)).await.unwrap();
        lifecycle.emit(LifecycleEvent::VisibilityChanged(Visibility::Hidden));
        manager.flush().await;
        assert_eq!(spy.saves.load(Ordering::SeqCst), 1);
        assert_eq!(manager.pending_events(), 0);

        lifecycle.emit(LifecycleEvent::VisibilityChanged(Visibility::Visible));
        lifecycle.emit(LifecycleEvent::Focus);
        manager.flush().await;
        assert_eq!(spy.saves.load(Ordering::SeqCst), 1);

        lifecycle.emit(LifecycleEvent::Unload);
        manager.flush().await;
        assert_eq!(spy.saves.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_detaches_every_trigger() {
        let setup = setup();
        let spy = Arc::new(SpyStore::default());
        let manager = SnapshotManager::new(setup.projection.clone(), spy.clone(), None, threshold(1));
        let lifecycle = Lifecycle::new();
        manager.start(setup.events.as_ref(), &lifecycle).unwrap();
        assert_eq!(lifecycle.listener_count(), 1);

        manager.stop();
        manager.stop();
        assert!(!manager.is_running());
        assert_eq!(lifecycle.listener_count(), 0);

        setup.events.append(&created(1)).await.unwrap();
        lifecycle.emit(LifecycleEvent::Unload);
        settle().await;
        assert_eq!(spy.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn save_without_events_is_a_noop() {
        let setup = setup();
        let spy = Arc::new(SpyStore::default());
        let manager = SnapshotManager::new(setup.projection, spy.clone(), None, threshold(50));
        assert!(!manager.save_snapshot(SnapshotTrigger::Manual).await);
        assert_eq!(spy.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_does_not_block_local_save() {
        let setup = setup();
        let local = Arc::new(SqliteSnapshotStore::in_memory());
        local.initialize().await.unwrap();
        let remote: Arc<dyn SnapshotStore> = Arc::new(SpyStore {
            fail: true,
            ..SpyStore::default()
        });
        let manager = SnapshotManager::new(
            setup.projection.clone(),
            local.clone(),
            Some(remote),
            threshold(50),
        );

        setup.events.append(&created(1)).await.unwrap();
        assert!(manager.save_snapshot(SnapshotTrigger::Manual).await);
        settle().await;

        let saved = local.load(ENTRY_LIST_SNAPSHOT_KEY).await.unwrap().unwrap();
        assert_eq!(saved.last_event_id, setup.projection.last_event_id().unwrap());
    }

    #[tokio::test]
    async fn local_failure_is_swallowed() {
        let setup = setup();
        let failing = Arc::new(SpyStore {
            fail: true,
            ..SpyStore::default()
        });
        let manager = SnapshotManager::new(setup.projection.clone(), failing, None, threshold(50));
        setup.events.append(&created(1)).await.unwrap();
        assert!(!manager.save_snapshot(SnapshotTrigger::Manual).await);
    }
}
