//! Entry model (tasks, notes, events)

use serde::{Deserialize, Serialize};

/// Entry subtype discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Task,
    Note,
    Event,
}

/// Task completion state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Open,
    Completed,
}

/// Subtype-specific fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum EntryBody {
    Task {
        title: String,
        status: TaskStatus,
        completed_at: Option<String>,
    },
    Note {
        content: String,
    },
    Event {
        content: String,
        event_date: Option<String>,
    },
}

/// Marker left in a collection after an entry was moved out of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhostMembership {
    /// Collection the entry used to live in
    pub collection_id: String,
    /// Collection the entry moved to
    pub moved_to: String,
    /// Timestamp of the removal event
    pub removed_at: String,
}

/// A journal entry as seen by the read models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub created_at: String,
    /// Fractional index for manual ordering
    pub order: Option<String>,
    /// Ordered set of collection memberships
    pub collections: Vec<String>,
    /// Collections this entry was moved out of
    pub ghosts: Vec<GhostMembership>,
    /// Parent entry for sub-tasks and nested notes
    pub parent_entry_id: Option<String>,
    /// Id of the copy created when this entry was migrated
    pub migrated_to: Option<String>,
    pub migrated_to_collection_id: Option<String>,
    /// Id of the entry this one was migrated from
    pub migrated_from: Option<String>,
    /// Soft-delete marker
    pub deleted_at: Option<String>,
    #[serde(flatten)]
    pub body: EntryBody,
}

impl Entry {
    pub(crate) fn new(id: String, created_at: String, body: EntryBody) -> Self {
        Self {
            id,
            created_at,
            order: None,
            collections: Vec::new(),
            ghosts: Vec::new(),
            parent_entry_id: None,
            migrated_to: None,
            migrated_to_collection_id: None,
            migrated_from: None,
            deleted_at: None,
            body,
        }
    }

    pub const fn kind(&self) -> EntryKind {
        match self.body {
            EntryBody::Task { .. } => EntryKind::Task,
            EntryBody::Note { .. } => EntryKind::Note,
            EntryBody::Event { .. } => EntryKind::Event,
        }
    }

    pub const fn is_task(&self) -> bool {
        matches!(self.body, EntryBody::Task { .. })
    }

    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub const fn is_migrated(&self) -> bool {
        self.migrated_to.is_some()
    }

    /// Task status, `None` for notes and events.
    pub const fn status(&self) -> Option<TaskStatus> {
        match &self.body {
            EntryBody::Task { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status() == Some(TaskStatus::Completed)
    }

    /// Title for tasks, content for notes and events.
    pub fn text(&self) -> &str {
        match &self.body {
            EntryBody::Task { title, .. } => title,
            EntryBody::Note { content } | EntryBody::Event { content, .. } => content,
        }
    }

    /// Legacy single-collection accessor: the first membership.
    pub fn collection_id(&self) -> Option<&str> {
        self.collections.first().map(String::as_str)
    }

    pub fn is_in(&self, collection_id: &str) -> bool {
        self.collections.iter().any(|id| id == collection_id)
    }

    pub fn is_uncategorized(&self) -> bool {
        self.collections.is_empty()
    }

    /// Ghost marker for a collection, if the entry was moved out of it.
    pub fn ghost_in(&self, collection_id: &str) -> Option<&GhostMembership> {
        self.ghosts
            .iter()
            .find(|ghost| ghost.collection_id == collection_id)
    }

    /// Add a membership, keeping the list a set. Clears any ghost there.
    pub(crate) fn join(&mut self, collection_id: &str) -> bool {
        self.ghosts
            .retain(|ghost| ghost.collection_id != collection_id);
        if self.is_in(collection_id) {
            return false;
        }
        self.collections.push(collection_id.to_string());
        true
    }

    /// Drop a membership; with `moved_to` a ghost is left behind.
    pub(crate) fn leave(
        &mut self,
        collection_id: &str,
        moved_to: Option<&str>,
        removed_at: &str,
    ) -> bool {
        let before = self.collections.len();
        self.collections.retain(|id| id != collection_id);
        let removed = self.collections.len() != before;
        if removed {
            if let Some(target) = moved_to {
                self.ghosts.push(GhostMembership {
                    collection_id: collection_id.to_string(),
                    moved_to: target.to_string(),
                    removed_at: removed_at.to_string(),
                });
            }
        }
        removed
    }
}

/// An entry as rendered in one collection: a live member or a ghost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEntry {
    pub entry: Entry,
    /// Target collection when this row is a ghost
    pub ghost_of: Option<String>,
}

impl CollectionEntry {
    pub const fn is_ghost(&self) -> bool {
        self.ghost_of.is_some()
    }
}

/// Completion summary for a parent task's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentCompletionStatus {
    pub total: usize,
    pub completed: usize,
}

impl ParentCompletionStatus {
    /// True when there is at least one child and all are completed.
    pub const fn all_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str) -> Entry {
        Entry::new(
            id.to_string(),
            "2024-01-01T00:00:00.000Z".to_string(),
            EntryBody::Task {
                title: "Write report".to_string(),
                status: TaskStatus::Open,
                completed_at: None,
            },
        )
    }

    #[test]
    fn membership_is_an_ordered_set() {
        let mut entry = task("t1");
        assert!(entry.join("a"));
        assert!(entry.join("b"));
        assert!(!entry.join("a"));
        assert_eq!(entry.collections, vec!["a", "b"]);
        assert_eq!(entry.collection_id(), Some("a"));
    }

    #[test]
    fn leave_with_target_leaves_ghost() {
        let mut entry = task("t1");
        entry.join("a");
        entry.join("b");
        assert!(entry.leave("a", Some("b"), "2024-01-02T00:00:00.000Z"));
        assert!(!entry.is_in("a"));
        assert_eq!(entry.ghost_in("a").map(|g| g.moved_to.as_str()), Some("b"));

        // Re-joining clears the ghost.
        entry.join("a");
        assert!(entry.ghost_in("a").is_none());
    }

    #[test]
    fn leave_without_target_leaves_nothing() {
        let mut entry = task("t1");
        entry.join("a");
        entry.leave("a", None, "2024-01-02T00:00:00.000Z");
        assert!(entry.is_uncategorized());
        assert!(entry.ghosts.is_empty());
    }

    #[test]
    fn parent_completion_requires_children() {
        let none = ParentCompletionStatus {
            total: 0,
            completed: 0,
        };
        assert!(!none.all_complete());
        let done = ParentCompletionStatus {
            total: 2,
            completed: 2,
        };
        assert!(done.all_complete());
    }
}
