//! Task-only read model

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::entry_list::{completion_status, fold_entry, sorted};
use super::{Projection, Reducer};
use crate::models::{DomainEvent, Entry, EventPayload, ParentCompletionStatus};
use crate::store::TASK_LIST_SNAPSHOT_KEY;

/// Tasks keyed by id. Notes and events are never admitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    tasks: BTreeMap<String, Entry>,
}

impl Reducer for TaskList {
    const SNAPSHOT_KEY: &'static str = TASK_LIST_SNAPSHOT_KEY;
    const SNAPSHOT_VERSION: u32 = 1;

    fn apply(&mut self, event: &DomainEvent) -> bool {
        match event.payload {
            EventPayload::NoteCreated { .. }
            | EventPayload::NoteContentChanged { .. }
            | EventPayload::EventCreated { .. }
            | EventPayload::EventContentChanged { .. }
            | EventPayload::EventDateChanged { .. } => false,
            // Entry-wide events only find tasks in this map.
            _ => fold_entry(&mut self.tasks, event),
        }
    }
}

impl Projection<TaskList> {
    /// Every live task in display order.
    pub fn get_tasks(&self) -> Vec<Entry> {
        self.read(|list| {
            sorted(
                list.tasks
                    .values()
                    .filter(|task| !task.is_deleted())
                    .cloned()
                    .collect(),
            )
        })
    }

    /// Live tasks that are neither completed nor migrated.
    pub fn get_open_tasks(&self) -> Vec<Entry> {
        self.get_tasks()
            .into_iter()
            .filter(|task| !task.is_completed() && !task.is_migrated())
            .collect()
    }

    pub fn get_task(&self, task_id: &str) -> Option<Entry> {
        self.read(|list| list.tasks.get(task_id).cloned())
    }

    pub fn get_sub_tasks(&self, parent_id: &str) -> Vec<Entry> {
        self.get_tasks()
            .into_iter()
            .filter(|task| task.parent_entry_id.as_deref() == Some(parent_id))
            .collect()
    }

    pub fn get_parent_completion_status(&self, parent_id: &str) -> ParentCompletionStatus {
        completion_status(self.get_sub_tasks(parent_id).iter())
    }
}
