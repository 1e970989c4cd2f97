//! Entry commands: create, edit, complete, delete, reorder

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{
    live_collection, live_entry, order_after_last_entry, real_collection_id, required_text,
    CommandHandler, IdInput,
};
use crate::error::{Error, Result};
use crate::fractional;
use crate::models::{DomainEvent, EntryBody, EventPayload, TaskStatus, UNCATEGORIZED_COLLECTION_ID};
use crate::projection::{CollectionListProjection, EntryListProjection};
use crate::store::EventStore;
use crate::util::{new_id, normalize_text_option};

/// Input shared by the task, note and event creators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEntryInput {
    /// Caller-chosen id so the caller can refer to the new entry
    pub id: String,
    /// Task title, or note/event content
    pub text: String,
    pub collection_id: Option<String>,
    /// Parent task (for tasks) or parent entry (for notes)
    pub parent_id: Option<String>,
    /// `YYYY-MM-DD`, events only
    pub event_date: Option<String>,
}

impl CreateEntryInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            text: text.into(),
            collection_id: None,
            parent_id: None,
            event_date: None,
        }
    }

    #[must_use]
    pub fn in_collection(mut self, collection_id: impl Into<String>) -> Self {
        self.collection_id = Some(collection_id.into());
        self
    }

    #[must_use]
    pub fn under(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    #[must_use]
    pub fn on(mut self, event_date: impl Into<String>) -> Self {
        self.event_date = Some(event_date.into());
        self
    }
}

struct Prepared {
    text: String,
    collection_id: Option<String>,
    parent_id: Option<String>,
    order: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ParentRule {
    /// Parent must be a top-level task
    Task,
    /// Parent may be any top-level entry
    Entry,
    Forbidden,
}

struct EntryCreator {
    events: Arc<dyn EventStore>,
    entries: Arc<EntryListProjection>,
    collections: Arc<CollectionListProjection>,
}

impl EntryCreator {
    fn prepare(&self, input: &CreateEntryInput, parent_rule: ParentRule) -> Result<Prepared> {
        let text = required_text(&input.text, "content")?;
        if self.entries.get_entry(&input.id).is_some() {
            return Err(Error::Validation(format!("entry {} already exists", input.id)));
        }

        let mut collection_id = real_collection_id(input.collection_id.as_deref()).map(str::to_string);
        if let Some(id) = collection_id.as_deref() {
            live_collection(&self.collections, id)?;
        }

        let parent_id = match (input.parent_id.as_deref(), parent_rule) {
            (None, _) => None,
            (Some(_), ParentRule::Forbidden) => {
                return Err(Error::Validation("events cannot be nested".to_string()));
            }
            (Some(parent_id), rule) => {
                let parent = live_entry(&self.entries, parent_id)?;
                if rule == ParentRule::Task && !parent.is_task() {
                    return Err(Error::Validation(format!("{parent_id} is not a task")));
                }
                if parent.parent_entry_id.is_some() {
                    return Err(Error::Validation(
                        "entries can only be nested one level deep".to_string(),
                    ));
                }
                if collection_id.is_none() {
                    collection_id = parent.collection_id().map(str::to_string);
                }
                Some(parent_id.to_string())
            }
        };

        let order = order_after_last_entry(
            &self.entries,
            collection_id.as_deref().unwrap_or(UNCATEGORIZED_COLLECTION_ID),
        )?;
        Ok(Prepared {
            text,
            collection_id,
            parent_id,
            order,
        })
    }
}

macro_rules! creator_handler {
    ($name:ident) => {
        pub struct $name {
            creator: EntryCreator,
        }

        impl $name {
            pub fn new(
                events: Arc<dyn EventStore>,
                entries: Arc<EntryListProjection>,
                collections: Arc<CollectionListProjection>,
            ) -> Self {
                Self {
                    creator: EntryCreator {
                        events,
                        entries,
                        collections,
                    },
                }
            }
        }
    };
}

creator_handler!(CreateTaskHandler);
creator_handler!(CreateNoteHandler);
creator_handler!(CreateEventHandler);

#[async_trait]
impl CommandHandler for CreateTaskHandler {
    type Input = CreateEntryInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        let prepared = self.creator.prepare(&input, ParentRule::Task)?;
        self.creator
            .events
            .append(&DomainEvent::new(EventPayload::TaskCreated {
                task_id: input.id,
                title: prepared.text,
                collection_id: prepared.collection_id,
                parent_task_id: prepared.parent_id,
                order: Some(prepared.order),
            }))
            .await
    }
}

#[async_trait]
impl CommandHandler for CreateNoteHandler {
    type Input = CreateEntryInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        let prepared = self.creator.prepare(&input, ParentRule::Entry)?;
        self.creator
            .events
            .append(&DomainEvent::new(EventPayload::NoteCreated {
                note_id: input.id,
                content: prepared.text,
                collection_id: prepared.collection_id,
                parent_entry_id: prepared.parent_id,
                order: Some(prepared.order),
            }))
            .await
    }
}

fn validate_event_date(event_date: Option<String>) -> Result<Option<String>> {
    let Some(date) = normalize_text_option(event_date) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map(|_| Some(date.clone()))
        .map_err(|_| Error::Validation(format!("event date must be YYYY-MM-DD: {date}")))
}

#[async_trait]
impl CommandHandler for CreateEventHandler {
    type Input = CreateEntryInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        let prepared = self.creator.prepare(&input, ParentRule::Forbidden)?;
        let event_date = validate_event_date(input.event_date)?;
        self.creator
            .events
            .append(&DomainEvent::new(EventPayload::EventCreated {
                event_id: input.id,
                content: prepared.text,
                event_date,
                collection_id: prepared.collection_id,
                order: Some(prepared.order),
            }))
            .await
    }
}

/// Change the text (and for events, the date) of an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditEntryInput {
    pub entry_id: String,
    pub text: Option<String>,
    /// `Some(None)` clears an event's date
    pub event_date: Option<Option<String>>,
}

pub struct EditEntryHandler {
    events: Arc<dyn EventStore>,
    entries: Arc<EntryListProjection>,
}

impl EditEntryHandler {
    pub fn new(events: Arc<dyn EventStore>, entries: Arc<EntryListProjection>) -> Self {
        Self { events, entries }
    }
}

#[async_trait]
impl CommandHandler for EditEntryHandler {
    type Input = EditEntryInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        let entry = live_entry(&self.entries, &input.entry_id)?;
        let text = input
            .text
            .as_deref()
            .map(|text| required_text(text, "content"))
            .transpose()?;

        let mut changes = Vec::new();
        match &entry.body {
            EntryBody::Task { title, .. } => {
                if input.event_date.is_some() {
                    return Err(Error::Validation("only events have a date".to_string()));
                }
                if let Some(text) = text.filter(|text| text != title) {
                    changes.push(EventPayload::TaskTitleChanged {
                        task_id: entry.id.clone(),
                        title: text,
                    });
                }
            }
            EntryBody::Note { content } => {
                if input.event_date.is_some() {
                    return Err(Error::Validation("only events have a date".to_string()));
                }
                if let Some(text) = text.filter(|text| text != content) {
                    changes.push(EventPayload::NoteContentChanged {
                        note_id: entry.id.clone(),
                        content: text,
                    });
                }
            }
            EntryBody::Event {
                content,
                event_date,
            } => {
                if let Some(text) = text.filter(|text| text != content) {
                    changes.push(EventPayload::EventContentChanged {
                        event_id: entry.id.clone(),
                        content: text,
                    });
                }
                if let Some(next) = input.event_date {
                    let next = validate_event_date(next)?;
                    if next != *event_date {
                        changes.push(EventPayload::EventDateChanged {
                            event_id: entry.id.clone(),
                            event_date: next,
                        });
                    }
                }
            }
        }

        let events: Vec<DomainEvent> = changes.into_iter().map(DomainEvent::new).collect();
        self.events.append_batch(&events).await
    }
}

pub struct CompleteTaskHandler {
    events: Arc<dyn EventStore>,
    entries: Arc<EntryListProjection>,
}

impl CompleteTaskHandler {
    pub fn new(events: Arc<dyn EventStore>, entries: Arc<EntryListProjection>) -> Self {
        Self { events, entries }
    }
}

#[async_trait]
impl CommandHandler for CompleteTaskHandler {
    type Input = IdInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        let entry = live_entry(&self.entries, &input.id)?;
        match entry.status() {
            None => Err(Error::Validation(format!("{} is not a task", input.id))),
            Some(TaskStatus::Completed) => Err(Error::Validation(format!(
                "task {} is already completed",
                input.id
            ))),
            Some(TaskStatus::Open) => {
                self.events
                    .append(&DomainEvent::new(EventPayload::TaskCompleted {
                        task_id: input.id,
                    }))
                    .await
            }
        }
    }
}

pub struct ReopenTaskHandler {
    events: Arc<dyn EventStore>,
    entries: Arc<EntryListProjection>,
}

impl ReopenTaskHandler {
    pub fn new(events: Arc<dyn EventStore>, entries: Arc<EntryListProjection>) -> Self {
        Self { events, entries }
    }
}

#[async_trait]
impl CommandHandler for ReopenTaskHandler {
    type Input = IdInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        let entry = live_entry(&self.entries, &input.id)?;
        match entry.status() {
            None => Err(Error::Validation(format!("{} is not a task", input.id))),
            Some(TaskStatus::Open) => Err(Error::Validation(format!(
                "task {} is not completed",
                input.id
            ))),
            Some(TaskStatus::Completed) => {
                self.events
                    .append(&DomainEvent::new(EventPayload::TaskReopened {
                        task_id: input.id,
                    }))
                    .await
            }
        }
    }
}

pub struct DeleteEntryHandler {
    events: Arc<dyn EventStore>,
    entries: Arc<EntryListProjection>,
}

impl DeleteEntryHandler {
    pub fn new(events: Arc<dyn EventStore>, entries: Arc<EntryListProjection>) -> Self {
        Self { events, entries }
    }
}

#[async_trait]
impl CommandHandler for DeleteEntryHandler {
    type Input = IdInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        live_entry(&self.entries, &input.id)?;
        self.events
            .append(&DomainEvent::new(EventPayload::EntryDeleted { entry_id: input.id }))
            .await
    }
}

pub struct RestoreEntryHandler {
    events: Arc<dyn EventStore>,
    entries: Arc<EntryListProjection>,
}

impl RestoreEntryHandler {
    pub fn new(events: Arc<dyn EventStore>, entries: Arc<EntryListProjection>) -> Self {
        Self { events, entries }
    }
}

#[async_trait]
impl CommandHandler for RestoreEntryHandler {
    type Input = IdInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        let entry = self
            .entries
            .get_entry(&input.id)
            .ok_or_else(|| Error::NotFound(format!("entry {}", input.id)))?;
        if !entry.is_deleted() {
            return Err(Error::Validation(format!("entry {} is not deleted", input.id)));
        }
        self.events
            .append(&DomainEvent::new(EventPayload::EntryRestored { entry_id: input.id }))
            .await
    }
}

/// Place an entry between two neighbors (`None` means the list edge).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderEntryInput {
    pub entry_id: String,
    pub previous_entry_id: Option<String>,
    pub next_entry_id: Option<String>,
}

pub struct ReorderEntryHandler {
    events: Arc<dyn EventStore>,
    entries: Arc<EntryListProjection>,
}

impl ReorderEntryHandler {
    pub fn new(events: Arc<dyn EventStore>, entries: Arc<EntryListProjection>) -> Self {
        Self { events, entries }
    }

    fn neighbor_order(&self, entry_id: Option<&str>) -> Result<Option<String>> {
        Ok(match entry_id {
            Some(id) => live_entry(&self.entries, id)?.order,
            None => None,
        })
    }
}

#[async_trait]
impl CommandHandler for ReorderEntryHandler {
    type Input = ReorderEntryInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        live_entry(&self.entries, &input.entry_id)?;
        let previous = self.neighbor_order(input.previous_entry_id.as_deref())?;
        let next = self.neighbor_order(input.next_entry_id.as_deref())?;
        let order = fractional::key_between(previous.as_deref(), next.as_deref())
            .map_err(|error| Error::Validation(format!("cannot place entry there: {error}")))?;

        self.events
            .append(&DomainEvent::new(EventPayload::EntryReordered {
                entry_id: input.entry_id,
                order,
            }))
            .await
    }
}
