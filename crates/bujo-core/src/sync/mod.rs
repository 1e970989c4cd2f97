//! Event log synchronization with the remote document store
//!
//! `SyncManager` schedules full reconciliation passes (interval, focus,
//! online, visibility) with an in-flight guard, debounce and timeout.
//! `CursorSync` is the timestamp-cursor bulk path for large logs.

mod cursor;
mod manager;
mod reconcile;

pub use cursor::{CursorSync, SYNC_CURSOR_KEY};
pub use manager::{SkipReason, SyncManager, SyncOutcome, SyncStateCallback, SYNC_TIMEOUT_MESSAGE};
pub use reconcile::{
    diff_by_id, reconcile_events, reconcile_snapshots, SnapshotReconciliation, SyncReport,
};
