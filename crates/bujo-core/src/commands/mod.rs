//! Command handlers
//!
//! Each handler validates its input against projection state, then appends
//! the resulting events. Nothing is appended when validation fails, and
//! multi-event commands go through one `append_batch`.

mod collection;
mod entry;
mod membership;
mod migration;
mod preferences;

use async_trait::async_trait;

pub use collection::{
    CreateCollectionHandler, CreateCollectionInput, DeleteCollectionHandler,
    FavoriteCollectionHandler, FavoriteCollectionInput, RenameCollectionHandler,
    RenameCollectionInput, ReorderCollectionHandler, ReorderCollectionInput,
    RestoreCollectionHandler, UpdateCollectionSettingsHandler, UpdateCollectionSettingsInput,
};
pub use entry::{
    CompleteTaskHandler, CreateEntryInput, CreateEventHandler, CreateNoteHandler,
    CreateTaskHandler, DeleteEntryHandler, EditEntryHandler, EditEntryInput, ReopenTaskHandler,
    ReorderEntryHandler, ReorderEntryInput, RestoreEntryHandler,
};
pub use membership::{
    AddEntryToCollectionHandler, MembershipInput, MoveEntryToCollectionHandler,
    MoveEntryToCollectionInput, RemoveEntryFromCollectionHandler,
};
pub use migration::{
    BulkMigrateEntriesHandler, BulkMigrateEntriesInput, MigrateEntryHandler, MigrateEntryInput,
};
pub use preferences::{UpdateUserPreferencesHandler, UpdateUserPreferencesInput};

use crate::error::{Error, Result};
use crate::fractional;
use crate::models::{Collection, Entry, UNCATEGORIZED_COLLECTION_ID};
use crate::projection::{CollectionListProjection, EntryListProjection};

/// Uniform command entry point.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    type Input: Send + 'static;

    async fn handle(&self, input: Self::Input) -> Result<()>;
}

/// Input for commands that only name one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdInput {
    pub id: String,
}

impl IdInput {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

fn required_text(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn live_entry(entries: &EntryListProjection, entry_id: &str) -> Result<Entry> {
    let entry = entries
        .get_entry(entry_id)
        .ok_or_else(|| Error::NotFound(format!("entry {entry_id}")))?;
    if entry.is_deleted() {
        return Err(Error::Validation(format!("entry {entry_id} is deleted")));
    }
    Ok(entry)
}

/// A live collection, or the virtual uncategorized one.
fn live_collection(collections: &CollectionListProjection, collection_id: &str) -> Result<Collection> {
    let collection = collections
        .get_collection(collection_id)
        .ok_or_else(|| Error::NotFound(format!("collection {collection_id}")))?;
    if collection.is_deleted() {
        return Err(Error::Validation(format!(
            "collection {collection_id} is deleted"
        )));
    }
    Ok(collection)
}

/// `None` and the uncategorized sentinel both mean "no membership".
fn real_collection_id(collection_id: Option<&str>) -> Option<&str> {
    collection_id.filter(|id| *id != UNCATEGORIZED_COLLECTION_ID)
}

/// Highest fractional key among a collection's members.
fn last_entry_order(entries: &EntryListProjection, collection_id: &str) -> Option<String> {
    entries
        .get_entries_by_collection(collection_id)
        .into_iter()
        .filter_map(|entry| entry.order)
        .max()
}

fn order_after_last_entry(entries: &EntryListProjection, collection_id: &str) -> Result<String> {
    let last = last_entry_order(entries, collection_id);
    fractional::key_between(last.as_deref(), None)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::db::Database;
    use crate::projection::{
        CollectionListProjection, EntryListProjection, UserPreferencesProjection,
    };
    use crate::store::{EventStore, SqliteEventStore};
    use crate::subscribers::Subscription;

    /// Event store plus attached projections.
    pub(crate) struct Fixture {
        pub events: Arc<SqliteEventStore>,
        pub entries: Arc<EntryListProjection>,
        pub collections: Arc<CollectionListProjection>,
        pub preferences: Arc<UserPreferencesProjection>,
        _attached: Vec<Subscription>,
    }

    impl Fixture {
        pub fn new() -> Self {
            let events = Arc::new(SqliteEventStore::new(Arc::new(
                Database::open_in_memory().unwrap(),
            )));
            let store: Arc<dyn EventStore> = events.clone();
            let entries = Arc::new(EntryListProjection::new(store.clone()));
            let collections = Arc::new(CollectionListProjection::new(store.clone()));
            let preferences = Arc::new(UserPreferencesProjection::new(store));
            let attached = vec![
                entries.attach(),
                collections.attach(),
                preferences.attach(),
            ];
            Self {
                events,
                entries,
                collections,
                preferences,
                _attached: attached,
            }
        }

        pub fn store(&self) -> Arc<dyn EventStore> {
            self.events.clone()
        }

        pub async fn event_count(&self) -> usize {
            self.events.count().await.unwrap()
        }
    }
}
