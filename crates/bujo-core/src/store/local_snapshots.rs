//! SQLite-backed snapshot store

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rusqlite::{params, OptionalExtension};

use super::SnapshotStore;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::ProjectionSnapshot;

enum Location {
    Shared(Arc<Database>),
    Path(PathBuf),
    Memory,
}

/// Local snapshot store. Unusable until `initialize()` has opened it.
pub struct SqliteSnapshotStore {
    location: Location,
    db: RwLock<Option<Arc<Database>>>,
}

impl SqliteSnapshotStore {
    /// Use an already opened database.
    pub const fn shared(db: Arc<Database>) -> Self {
        Self::with_location(Location::Shared(db))
    }

    /// Open a dedicated database file on `initialize()`.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self::with_location(Location::Path(path.into()))
    }

    pub const fn in_memory() -> Self {
        Self::with_location(Location::Memory)
    }

    const fn with_location(location: Location) -> Self {
        Self {
            location,
            db: RwLock::new(None),
        }
    }

    fn db(&self) -> Result<Arc<Database>> {
        self.db
            .read()
            .clone()
            .ok_or_else(|| Error::Storage("snapshot store not initialized".into()))
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn initialize(&self) -> Result<()> {
        if self.db.read().is_some() {
            return Ok(());
        }

        let db = match &self.location {
            Location::Shared(db) => Arc::clone(db),
            Location::Path(path) => Arc::new(Database::open(path)?),
            Location::Memory => Arc::new(Database::open_in_memory()?),
        };
        *self.db.write() = Some(db);
        Ok(())
    }

    async fn save(&self, key: &str, snapshot: &ProjectionSnapshot) -> Result<()> {
        let body = serde_json::to_string(snapshot)?;
        let db = self.db()?;
        let conn = db.connection().await;
        conn.execute(
            "INSERT OR REPLACE INTO snapshots (key, body) VALUES (?, ?)",
            params![key, body],
        )?;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<ProjectionSnapshot>> {
        let db = self.db()?;
        let body: Option<String> = {
            let conn = db.connection().await;
            conn.query_row(
                "SELECT body FROM snapshots WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?
        };

        match body {
            Some(body) => match serde_json::from_str(&body) {
                Ok(snapshot) => Ok(Some(snapshot)),
                Err(error) => {
                    tracing::warn!("Discarding unreadable snapshot {key}: {error}");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let db = self.db()?;
        let conn = db.connection().await;
        conn.execute("DELETE FROM snapshots WHERE key = ?", params![key])?;
        Ok(())
    }
}
