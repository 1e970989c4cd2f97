//! Application root wiring stores, projections, handlers and managers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::commands::{
    AddEntryToCollectionHandler, BulkMigrateEntriesHandler, CompleteTaskHandler,
    CreateCollectionHandler, CreateEventHandler, CreateNoteHandler, CreateTaskHandler,
    DeleteCollectionHandler, DeleteEntryHandler, EditEntryHandler, FavoriteCollectionHandler,
    MigrateEntryHandler, MoveEntryToCollectionHandler, RemoveEntryFromCollectionHandler,
    RenameCollectionHandler, ReopenTaskHandler, ReorderCollectionHandler, ReorderEntryHandler,
    RestoreCollectionHandler, RestoreEntryHandler, UpdateCollectionSettingsHandler,
    UpdateUserPreferencesHandler,
};
use crate::config::AppConfig;
use crate::db::{Database, LocalSettings};
use crate::error::{Error, Result};
use crate::lifecycle::{Lifecycle, LifecycleEvent};
use crate::projection::{
    CollectionListProjection, EntryListProjection, Snapshotable, TaskListProjection,
    UserPreferencesProjection,
};
use crate::snapshot_manager::{SnapshotManager, SnapshotTrigger};
use crate::state::SyncState;
use crate::store::{
    DocumentStore, EventStore, HttpDocumentStore, RemoteEventStore, RemoteSnapshotStore,
    SnapshotStore, SqliteEventStore, SqliteSnapshotStore,
};
use crate::subscribers::Subscription;
use crate::sync::{reconcile_snapshots, CursorSync, SyncManager, SyncOutcome, SyncReport};

/// Remote document store plus the user whose documents it holds.
pub struct RemoteBackend {
    pub documents: Arc<dyn DocumentStore>,
    pub user_id: String,
}

impl RemoteBackend {
    pub fn new(documents: Arc<dyn DocumentStore>, user_id: impl Into<String>) -> Self {
        Self {
            documents,
            user_id: user_id.into(),
        }
    }
}

struct Remote {
    events: Arc<RemoteEventStore>,
    snapshots: Arc<dyn SnapshotStore>,
}

/// Every command handler, wired to the service's stores and projections.
pub struct JournalHandlers {
    pub create_task: CreateTaskHandler,
    pub create_note: CreateNoteHandler,
    pub create_event: CreateEventHandler,
    pub edit_entry: EditEntryHandler,
    pub complete_task: CompleteTaskHandler,
    pub reopen_task: ReopenTaskHandler,
    pub delete_entry: DeleteEntryHandler,
    pub restore_entry: RestoreEntryHandler,
    pub reorder_entry: ReorderEntryHandler,
    pub add_to_collection: AddEntryToCollectionHandler,
    pub remove_from_collection: RemoveEntryFromCollectionHandler,
    pub move_to_collection: MoveEntryToCollectionHandler,
    pub migrate_entry: MigrateEntryHandler,
    pub bulk_migrate: BulkMigrateEntriesHandler,
    pub create_collection: CreateCollectionHandler,
    pub rename_collection: RenameCollectionHandler,
    pub delete_collection: DeleteCollectionHandler,
    pub restore_collection: RestoreCollectionHandler,
    pub reorder_collection: ReorderCollectionHandler,
    pub update_collection_settings: UpdateCollectionSettingsHandler,
    pub favorite_collection: FavoriteCollectionHandler,
    pub update_preferences: UpdateUserPreferencesHandler,
}

impl JournalHandlers {
    fn new(
        events: &Arc<dyn EventStore>,
        entries: &Arc<EntryListProjection>,
        collections: &Arc<CollectionListProjection>,
        preferences: &Arc<UserPreferencesProjection>,
    ) -> Self {
        let e = || Arc::clone(events);
        let entries = || Arc::clone(entries);
        let collections = || Arc::clone(collections);
        Self {
            create_task: CreateTaskHandler::new(e(), entries(), collections()),
            create_note: CreateNoteHandler::new(e(), entries(), collections()),
            create_event: CreateEventHandler::new(e(), entries(), collections()),
            edit_entry: EditEntryHandler::new(e(), entries()),
            complete_task: CompleteTaskHandler::new(e(), entries()),
            reopen_task: ReopenTaskHandler::new(e(), entries()),
            delete_entry: DeleteEntryHandler::new(e(), entries()),
            restore_entry: RestoreEntryHandler::new(e(), entries()),
            reorder_entry: ReorderEntryHandler::new(e(), entries()),
            add_to_collection: AddEntryToCollectionHandler::new(e(), entries(), collections()),
            remove_from_collection: RemoveEntryFromCollectionHandler::new(e(), entries()),
            move_to_collection: MoveEntryToCollectionHandler::new(e(), entries(), collections()),
            migrate_entry: MigrateEntryHandler::new(e(), entries(), collections()),
            bulk_migrate: BulkMigrateEntriesHandler::new(e(), entries(), collections()),
            create_collection: CreateCollectionHandler::new(e(), collections()),
            rename_collection: RenameCollectionHandler::new(e(), collections()),
            delete_collection: DeleteCollectionHandler::new(e(), collections()),
            restore_collection: RestoreCollectionHandler::new(e(), collections()),
            reorder_collection: ReorderCollectionHandler::new(e(), collections()),
            update_collection_settings: UpdateCollectionSettingsHandler::new(e(), collections()),
            favorite_collection: FavoriteCollectionHandler::new(e(), collections()),
            update_preferences: UpdateUserPreferencesHandler::new(e(), Arc::clone(preferences)),
        }
    }
}

/// Offline-first journal: local log, read models and optional remote sync.
pub struct JournalService {
    db_path: Option<PathBuf>,
    config: AppConfig,
    settings: LocalSettings,
    events: Arc<SqliteEventStore>,
    remote: Option<Remote>,
    entries: Arc<EntryListProjection>,
    tasks: Arc<TaskListProjection>,
    collections: Arc<CollectionListProjection>,
    preferences: Arc<UserPreferencesProjection>,
    handlers: JournalHandlers,
    lifecycle: Lifecycle,
    snapshot_managers: Vec<SnapshotManager<dyn Snapshotable>>,
    sync: Option<SyncManager>,
    attachments: Mutex<Vec<Subscription>>,
    shut_down: AtomicBool,
}

impl JournalService {
    /// Open the journal described by `config`.
    ///
    /// `config.database_path` must be set; the remote, when configured, is
    /// reached over HTTP.
    pub async fn open(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let db_path = config
            .database_path
            .clone()
            .ok_or_else(|| Error::InvalidInput("database_path is not configured".to_string()))?;
        let remote = match config.remote() {
            Some(remote) => {
                tracing::info!(base_url = %remote.base_url, "Remote sync enabled");
                let documents = HttpDocumentStore::new(remote.base_url, remote.auth_token)?;
                Some(RemoteBackend::new(Arc::new(documents), remote.user_id))
            }
            None => {
                tracing::info!("Running in local-only mode (no remote configured)");
                None
            }
        };
        Self::open_path(db_path, remote, config).await
    }

    /// Open a journal at `db_path`, creating parent directories as needed.
    pub async fn open_path(
        db_path: impl Into<PathBuf>,
        remote: Option<RemoteBackend>,
        config: AppConfig,
    ) -> Result<Self> {
        let db_path = db_path.into();
        let db = Database::open(&db_path)?;
        Self::start(db, Some(db_path), remote, config).await
    }

    /// Open an in-memory journal (primarily for tests).
    pub async fn open_in_memory(remote: Option<RemoteBackend>, config: AppConfig) -> Result<Self> {
        Self::start(Database::open_in_memory()?, None, remote, config).await
    }

    async fn start(
        db: Database,
        db_path: Option<PathBuf>,
        remote: Option<RemoteBackend>,
        config: AppConfig,
    ) -> Result<Self> {
        let db = Arc::new(db);
        let events = Arc::new(SqliteEventStore::new(Arc::clone(&db)));
        let store: Arc<dyn EventStore> = events.clone();
        let local_snapshots: Arc<dyn SnapshotStore> =
            Arc::new(SqliteSnapshotStore::shared(Arc::clone(&db)));
        local_snapshots.initialize().await?;

        let remote = remote.map(|backend| Remote {
            events: Arc::new(RemoteEventStore::new(
                Arc::clone(&backend.documents),
                backend.user_id.clone(),
            )),
            snapshots: Arc::new(RemoteSnapshotStore::new(backend.documents, backend.user_id)),
        });

        let entries = Arc::new(
            EntryListProjection::new(store.clone()).with_snapshot_store(local_snapshots.clone()),
        );
        let tasks = Arc::new(
            TaskListProjection::new(store.clone()).with_snapshot_store(local_snapshots.clone()),
        );
        let collections = Arc::new(
            CollectionListProjection::new(store.clone())
                .with_snapshot_store(local_snapshots.clone()),
        );
        let preferences = Arc::new(
            UserPreferencesProjection::new(store.clone())
                .with_snapshot_store(local_snapshots.clone()),
        );
        let attachments = vec![
            entries.attach(),
            tasks.attach(),
            collections.attach(),
            preferences.attach(),
        ];

        let projections: Vec<Arc<dyn Snapshotable>> = vec![
            entries.clone(),
            tasks.clone(),
            collections.clone(),
            preferences.clone(),
        ];
        Self::hydrate_all(&config, remote.as_ref(), local_snapshots.as_ref(), &projections)
            .await?;

        let lifecycle = Lifecycle::new();
        let remote_snapshots = remote.as_ref().map(|remote| remote.snapshots.clone());
        let mut snapshot_managers = Vec::with_capacity(projections.len());
        for projection in projections {
            let manager = SnapshotManager::new(
                projection,
                local_snapshots.clone(),
                remote_snapshots.clone(),
                config.snapshots,
            );
            manager.start(store.as_ref(), &lifecycle)?;
            snapshot_managers.push(manager);
        }

        let sync = match &remote {
            Some(remote) => {
                let manager = SyncManager::new(store.clone(), remote.events.clone(), config.sync);
                if config.sync.background {
                    manager.start(&lifecycle)?;
                }
                Some(manager)
            }
            None => None,
        };

        let handlers = JournalHandlers::new(&store, &entries, &collections, &preferences);
        tracing::info!(
            entries = entries.processed_count(),
            remote = remote.is_some(),
            "Journal opened"
        );

        Ok(Self {
            db_path,
            config,
            settings: LocalSettings::new(db),
            events,
            remote,
            entries,
            tasks,
            collections,
            preferences,
            handlers,
            lifecycle,
            snapshot_managers,
            sync,
            attachments: Mutex::new(attachments),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Cold start: adopt newer remote snapshots, then hydrate whatever
    /// still needs it from the local snapshot plus tail.
    async fn hydrate_all(
        config: &AppConfig,
        remote: Option<&Remote>,
        local_snapshots: &dyn SnapshotStore,
        projections: &[Arc<dyn Snapshotable>],
    ) -> Result<()> {
        for projection in projections {
            let needs_hydrate = match remote {
                Some(remote) => match reconcile_snapshots(
                    projection.as_ref(),
                    local_snapshots,
                    remote.snapshots.as_ref(),
                    config.sync.snapshot_fetch_timeout(),
                )
                .await
                {
                    Ok(outcome) => outcome.needs_hydrate(),
                    Err(error) => {
                        tracing::warn!(
                            key = projection.snapshot_key(),
                            "Snapshot reconciliation failed: {error}"
                        );
                        true
                    }
                },
                None => true,
            };
            if needs_hydrate {
                projection.hydrate().await?;
            }
        }
        Ok(())
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn events(&self) -> Arc<dyn EventStore> {
        self.events.clone()
    }

    pub async fn event_count(&self) -> Result<usize> {
        self.events.count().await
    }

    pub const fn entries(&self) -> &Arc<EntryListProjection> {
        &self.entries
    }

    pub const fn tasks(&self) -> &Arc<TaskListProjection> {
        &self.tasks
    }

    pub const fn collections(&self) -> &Arc<CollectionListProjection> {
        &self.collections
    }

    pub const fn preferences(&self) -> &Arc<UserPreferencesProjection> {
        &self.preferences
    }

    pub const fn handlers(&self) -> &JournalHandlers {
        &self.handlers
    }

    /// Host shells forward visibility, focus and connectivity here.
    pub const fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub const fn is_sync_enabled(&self) -> bool {
        self.sync.is_some()
    }

    pub fn sync_manager(&self) -> Option<&SyncManager> {
        self.sync.as_ref()
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync
            .as_ref()
            .map_or(SyncState::Offline, SyncManager::state)
    }

    /// Run one full reconciliation pass now.
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        let sync = self
            .sync
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("no remote is configured".to_string()))?;
        Ok(sync.sync_now().await)
    }

    /// Run one timestamp-cursor sync pass now.
    pub async fn cursor_sync(&self) -> Result<SyncReport> {
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("no remote is configured".to_string()))?;
        CursorSync::new(
            self.events.clone(),
            remote.events.clone(),
            self.settings.clone(),
            self.config.sync.cursor_batch_size,
        )
        .run()
        .await
    }

    /// Save every projection's snapshot now. Returns how many were saved.
    pub async fn save_snapshots(&self) -> usize {
        let mut saved = 0;
        for manager in &self.snapshot_managers {
            if manager.save_snapshot(SnapshotTrigger::Manual).await {
                saved += 1;
            }
        }
        saved
    }

    /// Emit `Unload`, wait for the resulting snapshot saves, then stop the
    /// managers and detach the projections. Safe to call twice.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.lifecycle.emit(LifecycleEvent::Unload);
        for manager in &self.snapshot_managers {
            manager.flush().await;
            manager.stop();
        }
        if let Some(sync) = &self.sync {
            sync.stop();
        }
        let attachments: Vec<Subscription> = std::mem::take(&mut *self.attachments.lock());
        for attachment in attachments {
            attachment.unsubscribe();
        }
        tracing::info!("Journal shut down");
    }
}
