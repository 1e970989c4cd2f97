//! Domain event model
//!
//! Events are the only source of truth. Every read model is derived by
//! folding them in append order. An event is never edited after append;
//! corrections (delete, restore, move) are new events.

use serde::{Deserialize, Serialize};

use super::{CollectionType, CompletedTaskBehavior};
use crate::util::{new_id, now_iso};

/// Schema version stamped on newly created events.
pub const CURRENT_EVENT_VERSION: u32 = 1;

/// An immutable record in the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Unique event identifier (UUID v7)
    pub id: String,
    /// Entity this event belongs to
    pub aggregate_id: String,
    /// ISO-8601 creation time, the ordering and sync key
    pub timestamp: String,
    /// Schema version of the payload shape
    pub version: u32,
    /// Type tag plus type-specific fields
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl DomainEvent {
    /// Create a new event for the payload's aggregate, stamped now.
    #[must_use]
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: new_id(),
            aggregate_id: payload.aggregate_id().to_string(),
            timestamp: now_iso(),
            version: CURRENT_EVENT_VERSION,
            payload,
        }
    }

    /// Override the timestamp (used by tests and imports).
    #[must_use]
    pub fn at(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Override the id (used by tests and imports).
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// The `type` discriminator.
    pub const fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }
}

/// Event payloads, one shape per `type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all_fields = "camelCase")]
pub enum EventPayload {
    TaskCreated {
        task_id: String,
        title: String,
        collection_id: Option<String>,
        parent_task_id: Option<String>,
        order: Option<String>,
    },
    TaskCompleted {
        task_id: String,
    },
    TaskReopened {
        task_id: String,
    },
    TaskTitleChanged {
        task_id: String,
        title: String,
    },
    NoteCreated {
        note_id: String,
        content: String,
        collection_id: Option<String>,
        parent_entry_id: Option<String>,
        order: Option<String>,
    },
    NoteContentChanged {
        note_id: String,
        content: String,
    },
    EventCreated {
        event_id: String,
        content: String,
        event_date: Option<String>,
        collection_id: Option<String>,
        order: Option<String>,
    },
    EventContentChanged {
        event_id: String,
        content: String,
    },
    EventDateChanged {
        event_id: String,
        event_date: Option<String>,
    },
    EntryDeleted {
        entry_id: String,
    },
    EntryRestored {
        entry_id: String,
    },
    EntryReordered {
        entry_id: String,
        order: String,
    },
    EntryMigrated {
        entry_id: String,
        new_entry_id: String,
        target_collection_id: String,
        order: Option<String>,
    },
    EntryAddedToCollection {
        entry_id: String,
        collection_id: String,
    },
    EntryRemovedFromCollection {
        entry_id: String,
        collection_id: String,
        /// Set when the removal is one half of a move; leaves a ghost behind.
        moved_to: Option<String>,
    },
    CollectionCreated {
        collection_id: String,
        name: String,
        collection_type: CollectionType,
        date: Option<String>,
        order: String,
    },
    CollectionRenamed {
        collection_id: String,
        name: String,
    },
    CollectionReordered {
        collection_id: String,
        order: String,
    },
    CollectionDeleted {
        collection_id: String,
    },
    CollectionRestored {
        collection_id: String,
    },
    CollectionFavorited {
        collection_id: String,
    },
    CollectionUnfavorited {
        collection_id: String,
    },
    CollectionSettingsUpdated {
        collection_id: String,
        completed_task_behavior: Option<CompletedTaskBehavior>,
    },
    UserPreferencesUpdated {
        default_completed_task_behavior: Option<CompletedTaskBehavior>,
        auto_favorite_recent_daily_logs: Option<bool>,
        auto_favorite_recent_monthly_logs: Option<bool>,
    },
}

/// Aggregate id used for the preferences singleton.
pub const USER_PREFERENCES_AGGREGATE: &str = "user-preferences";

impl EventPayload {
    /// Id of the entity this payload is about.
    pub fn aggregate_id(&self) -> &str {
        match self {
            Self::TaskCreated { task_id, .. }
            | Self::TaskCompleted { task_id }
            | Self::TaskReopened { task_id }
            | Self::TaskTitleChanged { task_id, .. } => task_id,
            Self::NoteCreated { note_id, .. } | Self::NoteContentChanged { note_id, .. } => {
                note_id
            }
            Self::EventCreated { event_id, .. }
            | Self::EventContentChanged { event_id, .. }
            | Self::EventDateChanged { event_id, .. } => event_id,
            Self::EntryDeleted { entry_id }
            | Self::EntryRestored { entry_id }
            | Self::EntryReordered { entry_id, .. }
            | Self::EntryMigrated { entry_id, .. }
            | Self::EntryAddedToCollection { entry_id, .. }
            | Self::EntryRemovedFromCollection { entry_id, .. } => entry_id,
            Self::CollectionCreated { collection_id, .. }
            | Self::CollectionRenamed { collection_id, .. }
            | Self::CollectionReordered { collection_id, .. }
            | Self::CollectionDeleted { collection_id }
            | Self::CollectionRestored { collection_id }
            | Self::CollectionFavorited { collection_id }
            | Self::CollectionUnfavorited { collection_id }
            | Self::CollectionSettingsUpdated { collection_id, .. } => collection_id,
            Self::UserPreferencesUpdated { .. } => USER_PREFERENCES_AGGREGATE,
        }
    }

    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::TaskCreated { .. } => "TaskCreated",
            Self::TaskCompleted { .. } => "TaskCompleted",
            Self::TaskReopened { .. } => "TaskReopened",
            Self::TaskTitleChanged { .. } => "TaskTitleChanged",
            Self::NoteCreated { .. } => "NoteCreated",
            Self::NoteContentChanged { .. } => "NoteContentChanged",
            Self::EventCreated { .. } => "EventCreated",
            Self::EventContentChanged { .. } => "EventContentChanged",
            Self::EventDateChanged { .. } => "EventDateChanged",
            Self::EntryDeleted { .. } => "EntryDeleted",
            Self::EntryRestored { .. } => "EntryRestored",
            Self::EntryReordered { .. } => "EntryReordered",
            Self::EntryMigrated { .. } => "EntryMigrated",
            Self::EntryAddedToCollection { .. } => "EntryAddedToCollection",
            Self::EntryRemovedFromCollection { .. } => "EntryRemovedFromCollection",
            Self::CollectionCreated { .. } => "CollectionCreated",
            Self::CollectionRenamed { .. } => "CollectionRenamed",
            Self::CollectionReordered { .. } => "CollectionReordered",
            Self::CollectionDeleted { .. } => "CollectionDeleted",
            Self::CollectionRestored { .. } => "CollectionRestored",
            Self::CollectionFavorited { .. } => "CollectionFavorited",
            Self::CollectionUnfavorited { .. } => "CollectionUnfavorited",
            Self::CollectionSettingsUpdated { .. } => "CollectionSettingsUpdated",
            Self::UserPreferencesUpdated { .. } => "UserPreferencesUpdated",
        }
    }
}
