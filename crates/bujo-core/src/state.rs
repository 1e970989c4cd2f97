//! Shared cross-platform state types.

use serde::Serialize;

/// Unified sync state reported by the sync manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    Error,
}
