//! Entry list read model: every task, note and event with its memberships

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::{Projection, Reducer};
use crate::models::{
    CollectionEntry, CompletedTaskBehavior, DomainEvent, Entry, EntryBody, EventPayload,
    ParentCompletionStatus, TaskStatus, UNCATEGORIZED_COLLECTION_ID,
};
use crate::store::ENTRY_LIST_SNAPSHOT_KEY;

/// Entries keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryList {
    entries: BTreeMap<String, Entry>,
}

impl Reducer for EntryList {
    const SNAPSHOT_KEY: &'static str = ENTRY_LIST_SNAPSHOT_KEY;
    const SNAPSHOT_VERSION: u32 = 1;

    fn apply(&mut self, event: &DomainEvent) -> bool {
        fold_entry(&mut self.entries, event)
    }
}

impl EntryList {
    pub fn get(&self, entry_id: &str) -> Option<&Entry> {
        self.entries.get(entry_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Apply one entry-affecting event to an id-keyed entry map.
///
/// Shared by the entry list and the task list, which folds the same events
/// over tasks only.
pub(crate) fn fold_entry(entries: &mut BTreeMap<String, Entry>, event: &DomainEvent) -> bool {
    let at = event.timestamp.as_str();
    match &event.payload {
        EventPayload::TaskCreated {
            task_id,
            title,
            collection_id,
            parent_task_id,
            order,
        } => create(
            entries,
            task_id,
            at,
            EntryBody::Task {
                title: title.clone(),
                status: TaskStatus::Open,
                completed_at: None,
            },
            collection_id.as_deref(),
            parent_task_id.clone(),
            order.clone(),
        ),
        EventPayload::NoteCreated {
            note_id,
            content,
            collection_id,
            parent_entry_id,
            order,
        } => create(
            entries,
            note_id,
            at,
            EntryBody::Note {
                content: content.clone(),
            },
            collection_id.as_deref(),
            parent_entry_id.clone(),
            order.clone(),
        ),
        EventPayload::EventCreated {
            event_id,
            content,
            event_date,
            collection_id,
            order,
        } => create(
            entries,
            event_id,
            at,
            EntryBody::Event {
                content: content.clone(),
                event_date: event_date.clone(),
            },
            collection_id.as_deref(),
            None,
            order.clone(),
        ),
        EventPayload::TaskCompleted { task_id } => update(entries, task_id, |entry| {
            match &mut entry.body {
                EntryBody::Task {
                    status,
                    completed_at,
                    ..
                } if *status == TaskStatus::Open => {
                    *status = TaskStatus::Completed;
                    *completed_at = Some(at.to_string());
                    true
                }
                _ => false,
            }
        }),
        EventPayload::TaskReopened { task_id } => update(entries, task_id, |entry| {
            match &mut entry.body {
                EntryBody::Task {
                    status,
                    completed_at,
                    ..
                } if *status == TaskStatus::Completed => {
                    *status = TaskStatus::Open;
                    *completed_at = None;
                    true
                }
                _ => false,
            }
        }),
        EventPayload::TaskTitleChanged { task_id, title } => update(entries, task_id, |entry| {
            match &mut entry.body {
                EntryBody::Task { title: current, .. } => replace(current, title),
                _ => false,
            }
        }),
        EventPayload::NoteContentChanged { note_id, content } => {
            update(entries, note_id, |entry| match &mut entry.body {
                EntryBody::Note { content: current } => replace(current, content),
                _ => false,
            })
        }
        EventPayload::EventContentChanged { event_id, content } => {
            update(entries, event_id, |entry| match &mut entry.body {
                EntryBody::Event {
                    content: current, ..
                } => replace(current, content),
                _ => false,
            })
        }
        EventPayload::EventDateChanged {
            event_id,
            event_date,
        } => update(entries, event_id, |entry| match &mut entry.body {
            EntryBody::Event {
                event_date: current,
                ..
            } => replace(current, event_date),
            _ => false,
        }),
        EventPayload::EntryDeleted { entry_id } => update(entries, entry_id, |entry| {
            if entry.is_deleted() {
                return false;
            }
            entry.deleted_at = Some(at.to_string());
            true
        }),
        EventPayload::EntryRestored { entry_id } => {
            update(entries, entry_id, |entry| entry.deleted_at.take().is_some())
        }
        EventPayload::EntryReordered { entry_id, order } => {
            update(entries, entry_id, |entry| {
                replace(&mut entry.order, &Some(order.clone()))
            })
        }
        EventPayload::EntryMigrated {
            entry_id,
            new_entry_id,
            target_collection_id,
            order,
        } => migrate(entries, entry_id, new_entry_id, target_collection_id, order, at),
        EventPayload::EntryAddedToCollection {
            entry_id,
            collection_id,
        } => {
            if collection_id == UNCATEGORIZED_COLLECTION_ID {
                return false;
            }
            update(entries, entry_id, |entry| entry.join(collection_id))
        }
        EventPayload::EntryRemovedFromCollection {
            entry_id,
            collection_id,
            moved_to,
        } => update(entries, entry_id, |entry| {
            entry.leave(collection_id, moved_to.as_deref(), at)
        }),
        EventPayload::CollectionCreated { .. }
        | EventPayload::CollectionRenamed { .. }
        | EventPayload::CollectionReordered { .. }
        | EventPayload::CollectionDeleted { .. }
        | EventPayload::CollectionRestored { .. }
        | EventPayload::CollectionFavorited { .. }
        | EventPayload::CollectionUnfavorited { .. }
        | EventPayload::CollectionSettingsUpdated { .. }
        | EventPayload::UserPreferencesUpdated { .. } => false,
    }
}

fn create(
    entries: &mut BTreeMap<String, Entry>,
    id: &str,
    at: &str,
    body: EntryBody,
    collection_id: Option<&str>,
    parent_entry_id: Option<String>,
    order: Option<String>,
) -> bool {
    if entries.contains_key(id) {
        tracing::debug!(entry_id = id, "Ignoring duplicate create");
        return false;
    }
    let mut entry = Entry::new(id.to_string(), at.to_string(), body);
    entry.parent_entry_id = parent_entry_id;
    entry.order = order;
    if let Some(collection_id) = collection_id.filter(|id| *id != UNCATEGORIZED_COLLECTION_ID) {
        entry.join(collection_id);
    }
    entries.insert(entry.id.clone(), entry);
    true
}

fn update(
    entries: &mut BTreeMap<String, Entry>,
    entry_id: &str,
    change: impl FnOnce(&mut Entry) -> bool,
) -> bool {
    entries.get_mut(entry_id).is_some_and(change)
}

fn replace<T: PartialEq + Clone>(current: &mut T, next: &T) -> bool {
    if current == next {
        return false;
    }
    *current = next.clone();
    true
}

fn migrate(
    entries: &mut BTreeMap<String, Entry>,
    entry_id: &str,
    new_entry_id: &str,
    target_collection_id: &str,
    order: &Option<String>,
    at: &str,
) -> bool {
    let Some(source) = entries.get_mut(entry_id) else {
        return false;
    };
    if source.is_migrated() {
        return false;
    }
    source.migrated_to = Some(new_entry_id.to_string());
    source.migrated_to_collection_id = Some(target_collection_id.to_string());

    let mut copy = source.clone();
    copy.id = new_entry_id.to_string();
    copy.created_at = at.to_string();
    copy.order.clone_from(order);
    copy.collections.clear();
    copy.ghosts.clear();
    copy.migrated_to = None;
    copy.migrated_to_collection_id = None;
    copy.migrated_from = Some(entry_id.to_string());
    copy.deleted_at = None;
    if target_collection_id != UNCATEGORIZED_COLLECTION_ID {
        copy.join(target_collection_id);
    }
    entries.entry(copy.id.clone()).or_insert(copy);
    true
}

/// Manual order first (fractional key), then creation time.
pub(crate) fn display_order(left: &Entry, right: &Entry) -> Ordering {
    left.order
        .is_none()
        .cmp(&right.order.is_none())
        .then_with(|| left.order.cmp(&right.order))
        .then_with(|| left.created_at.cmp(&right.created_at))
        .then_with(|| left.id.cmp(&right.id))
}

pub(crate) fn belongs_to(entry: &Entry, collection_id: &str) -> bool {
    if collection_id == UNCATEGORIZED_COLLECTION_ID {
        entry.is_uncategorized()
    } else {
        entry.is_in(collection_id)
    }
}

pub(crate) fn sorted(mut entries: Vec<Entry>) -> Vec<Entry> {
    entries.sort_by(display_order);
    entries
}

pub(crate) fn completion_status<'a>(
    children: impl Iterator<Item = &'a Entry>,
) -> ParentCompletionStatus {
    let mut status = ParentCompletionStatus {
        total: 0,
        completed: 0,
    };
    for child in children {
        status.total += 1;
        if child.is_completed() {
            status.completed += 1;
        }
    }
    status
}

impl Projection<EntryList> {
    pub fn get_entry(&self, entry_id: &str) -> Option<Entry> {
        self.read(|list| list.get(entry_id).cloned())
    }

    /// Every live entry in display order.
    pub fn get_entries(&self) -> Vec<Entry> {
        self.read(|list| {
            sorted(
                list.iter()
                    .filter(|entry| !entry.is_deleted())
                    .cloned()
                    .collect(),
            )
        })
    }

    /// Live members of a collection. `"uncategorized"` selects entries
    /// with no membership.
    pub fn get_entries_by_collection(&self, collection_id: &str) -> Vec<Entry> {
        self.read(|list| {
            sorted(
                list.iter()
                    .filter(|entry| !entry.is_deleted() && belongs_to(entry, collection_id))
                    .cloned()
                    .collect(),
            )
        })
    }

    /// Members plus ghosts of entries that were moved out.
    pub fn get_collection_view(&self, collection_id: &str) -> Vec<CollectionEntry> {
        let mut rows: Vec<CollectionEntry> = self.read(|list| {
            list.iter()
                .filter(|entry| !entry.is_deleted())
                .filter_map(|entry| {
                    if belongs_to(entry, collection_id) {
                        Some(CollectionEntry {
                            entry: entry.clone(),
                            ghost_of: None,
                        })
                    } else {
                        entry.ghost_in(collection_id).map(|ghost| CollectionEntry {
                            entry: entry.clone(),
                            ghost_of: Some(ghost.moved_to.clone()),
                        })
                    }
                })
                .collect()
        });
        rows.sort_by(|left, right| display_order(&left.entry, &right.entry));
        rows
    }

    /// Soft-deleted entries, most recently deleted first.
    pub fn get_deleted_entries(&self) -> Vec<Entry> {
        let mut deleted: Vec<Entry> = self.read(|list| {
            list.iter()
                .filter(|entry| entry.is_deleted())
                .cloned()
                .collect()
        });
        deleted.sort_by(|left, right| right.deleted_at.cmp(&left.deleted_at));
        deleted
    }

    /// Open, live, unmigrated tasks per collection id (uncategorized included).
    pub fn get_active_task_counts_by_collection(&self) -> HashMap<String, usize> {
        self.read(|list| {
            let mut counts = HashMap::new();
            for entry in list.iter().filter(|entry| {
                entry.status() == Some(TaskStatus::Open)
                    && !entry.is_deleted()
                    && !entry.is_migrated()
            }) {
                if entry.is_uncategorized() {
                    *counts
                        .entry(UNCATEGORIZED_COLLECTION_ID.to_string())
                        .or_insert(0) += 1;
                }
                for collection_id in &entry.collections {
                    *counts.entry(collection_id.clone()).or_insert(0) += 1;
                }
            }
            counts
        })
    }

    /// Live child tasks of `parent_id`.
    pub fn get_sub_tasks(&self, parent_id: &str) -> Vec<Entry> {
        self.read(|list| {
            sorted(
                list.iter()
                    .filter(|entry| {
                        entry.is_task()
                            && !entry.is_deleted()
                            && entry.parent_entry_id.as_deref() == Some(parent_id)
                    })
                    .cloned()
                    .collect(),
            )
        })
    }

    pub fn get_parent_completion_status(&self, parent_id: &str) -> ParentCompletionStatus {
        let children = self.get_sub_tasks(parent_id);
        completion_status(children.iter())
    }

    /// Collection members arranged for display under `behavior`.
    pub fn get_entries_for_display(
        &self,
        collection_id: &str,
        behavior: CompletedTaskBehavior,
    ) -> Vec<Entry> {
        let entries = self.get_entries_by_collection(collection_id);
        match behavior {
            CompletedTaskBehavior::KeepInPlace => entries,
            CompletedTaskBehavior::MoveToBottom => {
                let (completed, open): (Vec<Entry>, Vec<Entry>) =
                    entries.into_iter().partition(Entry::is_completed);
                open.into_iter().chain(completed).collect()
            }
            CompletedTaskBehavior::Collapse => entries
                .into_iter()
                .filter(|entry| !entry.is_completed())
                .collect(),
        }
    }
}
