//! Timestamp-cursor bulk sync
//!
//! Cheaper than full reconciliation for large logs: only events newer than
//! the stored cursor are compared. An event stamped at or before the cursor
//! that reaches either side late is picked up by the next full
//! reconciliation, not by this helper.

use std::sync::Arc;

use super::reconcile::{diff_by_id, SyncReport};
use crate::db::LocalSettings;
use crate::error::Result;
use crate::models::DomainEvent;
use crate::store::{EventStore, RemoteEventStore};

/// Local settings key holding the newest synced event timestamp.
pub const SYNC_CURSOR_KEY: &str = "bujo.sync.cursor";

pub struct CursorSync {
    local: Arc<dyn EventStore>,
    remote: Arc<RemoteEventStore>,
    settings: LocalSettings,
    batch_size: usize,
}

impl CursorSync {
    pub fn new(
        local: Arc<dyn EventStore>,
        remote: Arc<RemoteEventStore>,
        settings: LocalSettings,
        batch_size: usize,
    ) -> Self {
        Self {
            local,
            remote,
            settings,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn cursor(&self) -> Result<Option<String>> {
        self.settings.get(SYNC_CURSOR_KEY).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.settings.remove(SYNC_CURSOR_KEY).await
    }

    /// Upload local events newer than the cursor in batches, download
    /// remote events newer than the cursor that are missing locally, then
    /// advance the cursor to the newest timestamp seen.
    pub async fn run(&self) -> Result<SyncReport> {
        let cursor = self.cursor().await?;
        let newer = |event: &&DomainEvent| {
            cursor
                .as_deref()
                .map_or(true, |cursor| event.timestamp.as_str() > cursor)
        };

        let local_events = self.local.get_all().await?;
        let upload: Vec<DomainEvent> = local_events.iter().filter(newer).cloned().collect();
        for (index, batch) in upload.chunks(self.batch_size).enumerate() {
            tracing::debug!(batch = index, size = batch.len(), "Uploading event batch");
            self.remote.append_batch(batch).await?;
        }

        let remote_events = match cursor.as_deref() {
            Some(cursor) => self.remote.get_since(cursor).await?,
            None => self.remote.get_all().await?,
        };
        let download = diff_by_id(&remote_events, &local_events);
        if !download.is_empty() {
            self.local.append_batch(&download).await?;
        }

        let newest = upload
            .iter()
            .chain(remote_events.iter())
            .map(|event| event.timestamp.as_str())
            .max();
        if let Some(newest) = newest {
            if cursor.as_deref().map_or(true, |cursor| newest > cursor) {
                self.settings.set(SYNC_CURSOR_KEY, newest).await?;
            }
        }

        tracing::info!(
            uploaded = upload.len(),
            downloaded = download.len(),
            "Cursor sync completed"
        );
        Ok(SyncReport {
            uploaded: upload.len(),
            downloaded: download.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::EventPayload;
    use crate::store::{MemoryDocumentStore, SqliteEventStore};
    use pretty_assertions::assert_eq;

    fn event(id: &str, timestamp: &str) -> DomainEvent {
        DomainEvent::new(EventPayload::TaskCompleted {
            task_id: "t1".to_string(),
        })
        .with_id(id)
        .at(timestamp)
    }

    struct Setup {
        local: Arc<SqliteEventStore>,
        remote: Arc<RemoteEventStore>,
        sync: CursorSync,
    }

    fn setup(batch_size: usize) -> Setup {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let local = Arc::new(SqliteEventStore::new(db.clone()));
        let remote = Arc::new(RemoteEventStore::new(Arc::new(MemoryDocumentStore::new()), "u1"));
        let sync = CursorSync::new(local.clone(), remote.clone(), LocalSettings::new(db), batch_size);
        Setup {
            local,
            remote,
            sync,
        }
    }

    #[tokio::test]
    async fn uploads_in_batches_and_advances_cursor() {
        let setup = setup(2);
        for (id, at) in [
            ("a", "2024-01-01T00:00:01.000Z"),
            ("b", "2024-01-01T00:00:02.000Z"),
            ("c", "2024-01-01T00:00:03.000Z"),
        ] {
            setup.local.append(&event(id, at)).await.unwrap();
        }

        let report = setup.sync.run().await.unwrap();
        assert_eq!(report.uploaded, 3);
        assert_eq!(setup.remote.get_all().await.unwrap().len(), 3);
        assert_eq!(
            setup.sync.cursor().await.unwrap().as_deref(),
            Some("2024-01-01T00:00:03.000Z")
        );

        // Nothing newer than the cursor: nothing moves.
        let again = setup.sync.run().await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn downloads_only_newer_missing_events() {
        let setup = setup(500);
        setup
            .local
            .append(&event("a", "2024-01-01T00:00:01.000Z"))
            .await
            .unwrap();
        setup.sync.run().await.unwrap();

        setup
            .remote
            .append(&event("old", "2024-01-01T00:00:00.500Z"))
            .await
            .unwrap();
        setup
            .remote
            .append(&event("new", "2024-01-01T00:00:05.000Z"))
            .await
            .unwrap();

        let report = setup.sync.run().await.unwrap();
        assert_eq!(report.downloaded, 1);
        let ids: Vec<String> = setup
            .local
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|event| event.id)
            .collect();
        assert_eq!(ids, vec!["a", "new"]);

        setup.sync.reset().await.unwrap();
        assert_eq!(setup.sync.cursor().await.unwrap(), None);
    }
}
