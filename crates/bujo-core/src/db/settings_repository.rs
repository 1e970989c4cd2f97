//! Local key/value settings repository
//!
//! Holds device-local values that never sync, such as the cursor used by
//! the bulk upload helper.

use std::sync::Arc;

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::Result;

/// SQLite-backed local settings
#[derive(Clone)]
pub struct LocalSettings {
    db: Arc<Database>,
}

impl LocalSettings {
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.db.connection().await;
        let value = conn
            .query_row(
                "SELECT value FROM local_settings WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.db.connection().await;
        conn.execute(
            "INSERT OR REPLACE INTO local_settings (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let conn = self.db.connection().await;
        conn.execute("DELETE FROM local_settings WHERE key = ?", params![key])?;
        Ok(())
    }
}
