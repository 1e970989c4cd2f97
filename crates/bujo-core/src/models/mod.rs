//! Data models for bujo

mod collection;
mod entry;
mod event;
mod preferences;
mod snapshot;

pub use collection::{
    Collection, CollectionSettings, CollectionType, CompletedTaskBehavior,
    UNCATEGORIZED_COLLECTION_ID, UNCATEGORIZED_ORDER,
};
pub use entry::{
    CollectionEntry, Entry, EntryBody, EntryKind, GhostMembership, ParentCompletionStatus,
    TaskStatus,
};
pub use event::{DomainEvent, EventPayload, CURRENT_EVENT_VERSION, USER_PREFERENCES_AGGREGATE};
pub use preferences::UserPreferences;
pub use snapshot::ProjectionSnapshot;
