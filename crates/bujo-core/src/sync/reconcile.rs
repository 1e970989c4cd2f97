//! Merge-by-id reconciliation of event logs and snapshots

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;

use crate::error::Result;
use crate::models::DomainEvent;
use crate::projection::Snapshotable;
use crate::store::{EventStore, SnapshotStore};

/// Events moved in one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub uploaded: usize,
    pub downloaded: usize,
}

impl SyncReport {
    pub const fn is_empty(&self) -> bool {
        self.uploaded == 0 && self.downloaded == 0
    }
}

/// Events in `events` whose id does not appear in `known`, in their
/// original order.
pub fn diff_by_id(events: &[DomainEvent], known: &[DomainEvent]) -> Vec<DomainEvent> {
    let known: HashSet<&str> = known.iter().map(|event| event.id.as_str()).collect();
    events
        .iter()
        .filter(|event| !known.contains(event.id.as_str()))
        .cloned()
        .collect()
}

/// Full-set bidirectional merge: upload what only `local` has, append
/// locally what only `remote` has. Running it twice moves nothing the
/// second time.
pub async fn reconcile_events(local: &dyn EventStore, remote: &dyn EventStore) -> Result<SyncReport> {
    let (local_events, remote_events) = tokio::try_join!(local.get_all(), remote.get_all())?;

    let upload = diff_by_id(&local_events, &remote_events);
    let download = diff_by_id(&remote_events, &local_events);
    tracing::debug!(
        local = local_events.len(),
        remote = remote_events.len(),
        upload = upload.len(),
        download = download.len(),
        "Reconciling event logs"
    );

    if !upload.is_empty() {
        remote.append_batch(&upload).await?;
    }
    if !download.is_empty() {
        local.append_batch(&download).await?;
    }

    Ok(SyncReport {
        uploaded: upload.len(),
        downloaded: download.len(),
    })
}

/// Result of the cold-start snapshot check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotReconciliation {
    /// Remote snapshot was newer; it is now saved locally and hydrated
    AdoptedRemote,
    /// No remote snapshot, or the local one is at least as new
    KeptLocal,
    /// Remote load failed or timed out
    RemoteUnavailable,
}

impl SnapshotReconciliation {
    /// True when the projection still needs a regular `hydrate()`.
    pub const fn needs_hydrate(self) -> bool {
        !matches!(self, Self::AdoptedRemote)
    }
}

/// Cold-start check: adopt the remote snapshot when it is strictly newer
/// than the local one, so a fresh device skips the full replay.
///
/// The remote load races `fetch_timeout`; losing the race is not an error.
pub async fn reconcile_snapshots<P: Snapshotable + ?Sized>(
    projection: &P,
    local: &dyn SnapshotStore,
    remote: &dyn SnapshotStore,
    fetch_timeout: Duration,
) -> Result<SnapshotReconciliation> {
    let key = projection.snapshot_key().to_string();

    let remote_snapshot = match tokio::time::timeout(fetch_timeout, remote.load(&key)).await {
        Ok(Ok(Some(snapshot))) => snapshot,
        Ok(Ok(None)) => return Ok(SnapshotReconciliation::KeptLocal),
        Ok(Err(error)) => {
            tracing::warn!(%key, "Remote snapshot unavailable: {error}");
            return Ok(SnapshotReconciliation::RemoteUnavailable);
        }
        Err(_) => {
            tracing::warn!(%key, timeout_ms = fetch_timeout.as_millis(), "Remote snapshot fetch timed out");
            return Ok(SnapshotReconciliation::RemoteUnavailable);
        }
    };

    let local_snapshot = match local.load(&key).await {
        Ok(snapshot) => snapshot,
        Err(error) => {
            tracing::warn!(%key, "Local snapshot unreadable: {error}");
            None
        }
    };
    let remote_is_newer = local_snapshot
        .as_ref()
        .map_or(true, |local| remote_snapshot.is_newer_than(local));
    if !remote_is_newer {
        tracing::debug!(%key, "Local snapshot is current");
        return Ok(SnapshotReconciliation::KeptLocal);
    }

    tracing::info!(
        %key,
        saved_at = %remote_snapshot.saved_at,
        "Adopting newer remote snapshot"
    );
    local.save(&key, &remote_snapshot).await?;
    projection.hydrate_from_snapshot(remote_snapshot).await?;
    Ok(SnapshotReconciliation::AdoptedRemote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{EventPayload, ProjectionSnapshot};
    use crate::projection::EntryListProjection;
    use crate::store::{
        MemoryDocumentStore, RemoteEventStore, RemoteSnapshotStore, SqliteEventStore,
        SqliteSnapshotStore, ENTRY_LIST_SNAPSHOT_KEY,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn completed(id: &str) -> DomainEvent {
        DomainEvent::new(EventPayload::TaskCompleted {
            task_id: "t1".to_string(),
        })
        .with_id(id)
    }

    fn ids(events: &[DomainEvent]) -> Vec<&str> {
        events.iter().map(|event| event.id.as_str()).collect()
    }

    #[test]
    fn diff_keeps_order_and_drops_known() {
        let events = vec![completed("a"), completed("b"), completed("c")];
        let known = vec![completed("b")];
        assert_eq!(ids(&diff_by_id(&events, &known)), vec!["a", "c"]);
        assert!(diff_by_id(&known, &events).is_empty());
    }

    #[tokio::test]
    async fn reconcile_moves_each_side_once() {
        let local = SqliteEventStore::new(Arc::new(Database::open_in_memory().unwrap()));
        let remote = RemoteEventStore::new(Arc::new(MemoryDocumentStore::new()), "u1");
        local.append(&completed("local-only")).await.unwrap();
        local.append(&completed("shared")).await.unwrap();
        remote.append(&completed("shared")).await.unwrap();
        remote.append(&completed("remote-only")).await.unwrap();

        let report = reconcile_events(&local, &remote).await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                uploaded: 1,
                downloaded: 1
            }
        );
        assert_eq!(local.count().await.unwrap(), 3);
        assert_eq!(remote.get_all().await.unwrap().len(), 3);

        let again = reconcile_events(&local, &remote).await.unwrap();
        assert!(again.is_empty());
    }

    fn snapshot(saved_at: &str) -> ProjectionSnapshot {
        ProjectionSnapshot {
            version: 1,
            last_event_id: "e1".to_string(),
            state: serde_json::json!({
                "state": { "entries": {} },
                "seenEventIds": ["e1"]
            }),
            saved_at: saved_at.to_string(),
        }
    }

    struct Stores {
        projection: EntryListProjection,
        local: SqliteSnapshotStore,
        remote: RemoteSnapshotStore,
    }

    async fn stores() -> Stores {
        let local = SqliteSnapshotStore::in_memory();
        local.initialize().await.unwrap();
        Stores {
            projection: EntryListProjection::new(Arc::new(SqliteEventStore::new(Arc::new(
                Database::open_in_memory().unwrap(),
            )))),
            local,
            remote: RemoteSnapshotStore::new(Arc::new(MemoryDocumentStore::new()), "u1"),
        }
    }

    #[tokio::test]
    async fn adopts_strictly_newer_remote_snapshot() {
        let stores = stores().await;
        stores
            .local
            .save(ENTRY_LIST_SNAPSHOT_KEY, &snapshot("2024-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        stores
            .remote
            .save(ENTRY_LIST_SNAPSHOT_KEY, &snapshot("2024-01-02T00:00:00.000Z"))
            .await
            .unwrap();

        let outcome = reconcile_snapshots(
            &stores.projection,
            &stores.local,
            &stores.remote,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(outcome, SnapshotReconciliation::AdoptedRemote);
        let local = stores.local.load(ENTRY_LIST_SNAPSHOT_KEY).await.unwrap().unwrap();
        assert_eq!(local.saved_at, "2024-01-02T00:00:00.000Z");
        assert_eq!(stores.projection.processed_count(), 1);
    }

    #[tokio::test]
    async fn keeps_local_when_remote_is_older_or_missing() {
        let stores = stores().await;
        let outcome = reconcile_snapshots(
            &stores.projection,
            &stores.local,
            &stores.remote,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(outcome, SnapshotReconciliation::KeptLocal);

        stores
            .local
            .save(ENTRY_LIST_SNAPSHOT_KEY, &snapshot("2024-01-02T00:00:00.000Z"))
            .await
            .unwrap();
        stores
            .remote
            .save(ENTRY_LIST_SNAPSHOT_KEY, &snapshot("2024-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        let outcome = reconcile_snapshots(
            &stores.projection,
            &stores.local,
            &stores.remote,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(outcome, SnapshotReconciliation::KeptLocal);
        assert!(outcome.needs_hydrate());
    }
}
