//! SQLite-backed event store

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection};

use super::{EventListener, EventStore};
use crate::db::Database;
use crate::error::Result;
use crate::models::DomainEvent;
use crate::subscribers::{Subscribers, Subscription};

/// Local persistent event log. Each event is a row keyed by its own id.
pub struct SqliteEventStore {
    db: Arc<Database>,
    subscribers: Subscribers<DomainEvent>,
}

impl SqliteEventStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            subscribers: Subscribers::new(),
        }
    }

    /// Number of events in the log
    pub async fn count(&self) -> Result<usize> {
        let conn = self.db.connection().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Insert one event; returns false when the id already exists.
    fn insert(conn: &Connection, event: &DomainEvent) -> Result<bool> {
        let body = serde_json::to_string(event)?;
        let rows = conn.execute(
            "INSERT OR IGNORE INTO events (id, event_type, aggregate_id, timestamp, version, body)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                event.id,
                event.event_type(),
                event.aggregate_id,
                event.timestamp,
                event.version,
                body
            ],
        )?;
        Ok(rows == 1)
    }

    fn query_events(
        conn: &Connection,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> Result<Vec<DomainEvent>> {
        let mut stmt = conn.prepare(sql)?;
        let bodies = stmt
            .query_map(args, |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    // Subscribers are notified while the connection is still held, so
    // concurrent appenders deliver in `seq` order.
    async fn append(&self, event: &DomainEvent) -> Result<()> {
        let conn = self.db.connection().await;
        if Self::insert(&conn, event)? {
            self.subscribers.notify(event);
        } else {
            tracing::debug!(event_id = %event.id, "Ignoring duplicate event append");
        }
        drop(conn);
        Ok(())
    }

    async fn append_batch(&self, events: &[DomainEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut conn = self.db.connection().await;
        let tx = conn.transaction()?;
        let mut inserted = Vec::with_capacity(events.len());
        for event in events {
            if Self::insert(&tx, event)? {
                inserted.push(event);
            }
        }
        tx.commit()?;

        for event in inserted {
            self.subscribers.notify(event);
        }
        drop(conn);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<DomainEvent>> {
        let conn = self.db.connection().await;
        Self::query_events(&conn, "SELECT body FROM events ORDER BY seq", [])
    }

    async fn get_by_id(&self, aggregate_id: &str) -> Result<Vec<DomainEvent>> {
        let conn = self.db.connection().await;
        Self::query_events(
            &conn,
            "SELECT body FROM events WHERE aggregate_id = ? ORDER BY seq",
            params![aggregate_id],
        )
    }

    async fn get_after(&self, event_id: &str) -> Result<Vec<DomainEvent>> {
        let conn = self.db.connection().await;
        Self::query_events(
            &conn,
            "SELECT body FROM events
             WHERE seq > COALESCE((SELECT seq FROM events WHERE id = ?), 0)
             ORDER BY seq",
            params![event_id],
        )
    }

    fn subscribe(&self, listener: EventListener) -> Subscription {
        self.subscribers.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventPayload;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn setup() -> SqliteEventStore {
        SqliteEventStore::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn completed(task_id: &str) -> DomainEvent {
        DomainEvent::new(EventPayload::TaskCompleted {
            task_id: task_id.to_string(),
        })
    }

    #[tokio::test]
    async fn test_get_all_preserves_append_order() {
        let store = setup();
        let events = vec![completed("a"), completed("b"), completed("a")];
        for event in &events {
            store.append(event).await.unwrap();
        }

        assert_eq!(store.get_all().await.unwrap(), events);
        assert_eq!(store.get_by_id("a").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_append_is_ignored_and_not_notified() {
        let store = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = store.subscribe(Box::new(move |event: &DomainEvent| {
            sink.lock().push(event.id.clone());
        }));

        let event = completed("a");
        store.append(&event).await.unwrap();
        store.append(&event).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(*seen.lock(), vec![event.id]);
    }

    #[tokio::test]
    async fn test_append_batch_notifies_in_order() {
        let store = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = store.subscribe(Box::new(move |event: &DomainEvent| {
            sink.lock().push(event.id.clone());
        }));

        let events = vec![completed("a"), completed("b")];
        store.append_batch(&events).await.unwrap();

        let ids: Vec<String> = events.iter().map(|event| event.id.clone()).collect();
        assert_eq!(*seen.lock(), ids);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_notify_in_log_order() {
        for _ in 0..50 {
            let store = Arc::new(setup());
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            let _subscription = store.subscribe(Box::new(move |event: &DomainEvent| {
                sink.lock().push(event.id.clone());
            }));

            let tasks: Vec<_> = (0..8)
                .map(|index| {
                    let store = Arc::clone(&store);
                    tokio::spawn(async move {
                        store.append(&completed(&format!("t{index}"))).await.unwrap();
                    })
                })
                .collect();
            for task in tasks {
                task.await.unwrap();
            }

            let logged: Vec<String> = store
                .get_all()
                .await
                .unwrap()
                .into_iter()
                .map(|event| event.id)
                .collect();
            assert_eq!(*seen.lock(), logged);
        }
    }

    #[tokio::test]
    async fn test_get_after_returns_tail() {
        let store = setup();
        let events = vec![completed("a"), completed("b"), completed("c")];
        store.append_batch(&events).await.unwrap();

        let tail = store.get_after(&events[0].id).await.unwrap();
        assert_eq!(tail, events[1..].to_vec());

        let unknown = store.get_after("missing").await.unwrap();
        assert_eq!(unknown.len(), 3);
    }
}
