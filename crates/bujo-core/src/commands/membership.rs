//! Multi-collection membership commands

use std::sync::Arc;

use async_trait::async_trait;

use super::{live_collection, live_entry, real_collection_id, CommandHandler};
use crate::error::{Error, Result};
use crate::models::{DomainEvent, EventPayload};
use crate::projection::{CollectionListProjection, EntryListProjection};
use crate::store::EventStore;

/// Names an entry and one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipInput {
    pub entry_id: String,
    pub collection_id: String,
}

impl MembershipInput {
    pub fn new(entry_id: impl Into<String>, collection_id: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            collection_id: collection_id.into(),
        }
    }
}

fn real_target(collections: &CollectionListProjection, collection_id: &str) -> Result<String> {
    let Some(collection_id) = real_collection_id(Some(collection_id)) else {
        return Err(Error::Validation(
            "uncategorized is not a real collection".to_string(),
        ));
    };
    live_collection(collections, collection_id)?;
    Ok(collection_id.to_string())
}

pub struct AddEntryToCollectionHandler {
    events: Arc<dyn EventStore>,
    entries: Arc<EntryListProjection>,
    collections: Arc<CollectionListProjection>,
}

impl AddEntryToCollectionHandler {
    pub fn new(
        events: Arc<dyn EventStore>,
        entries: Arc<EntryListProjection>,
        collections: Arc<CollectionListProjection>,
    ) -> Self {
        Self {
            events,
            entries,
            collections,
        }
    }
}

#[async_trait]
impl CommandHandler for AddEntryToCollectionHandler {
    type Input = MembershipInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        let entry = live_entry(&self.entries, &input.entry_id)?;
        let collection_id = real_target(&self.collections, &input.collection_id)?;
        if entry.is_in(&collection_id) {
            return Err(Error::Validation(format!(
                "entry {} is already in collection {collection_id}",
                input.entry_id
            )));
        }

        self.events
            .append(&DomainEvent::new(EventPayload::EntryAddedToCollection {
                entry_id: input.entry_id,
                collection_id,
            }))
            .await
    }
}

pub struct RemoveEntryFromCollectionHandler {
    events: Arc<dyn EventStore>,
    entries: Arc<EntryListProjection>,
}

impl RemoveEntryFromCollectionHandler {
    pub fn new(events: Arc<dyn EventStore>, entries: Arc<EntryListProjection>) -> Self {
        Self { events, entries }
    }
}

#[async_trait]
impl CommandHandler for RemoveEntryFromCollectionHandler {
    type Input = MembershipInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        let entry = live_entry(&self.entries, &input.entry_id)?;
        if !entry.is_in(&input.collection_id) {
            return Err(Error::Validation(format!(
                "entry {} is not in collection {}",
                input.entry_id, input.collection_id
            )));
        }

        self.events
            .append(&DomainEvent::new(
                EventPayload::EntryRemovedFromCollection {
                    entry_id: input.entry_id,
                    collection_id: input.collection_id,
                    moved_to: None,
                },
            ))
            .await
    }
}

/// Move an entry out of one collection and into another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveEntryToCollectionInput {
    pub entry_id: String,
    /// Collection to leave; defaults to the entry's first membership
    pub from_collection_id: Option<String>,
    pub to_collection_id: String,
}

pub struct MoveEntryToCollectionHandler {
    events: Arc<dyn EventStore>,
    entries: Arc<EntryListProjection>,
    collections: Arc<CollectionListProjection>,
}

impl MoveEntryToCollectionHandler {
    pub fn new(
        events: Arc<dyn EventStore>,
        entries: Arc<EntryListProjection>,
        collections: Arc<CollectionListProjection>,
    ) -> Self {
        Self {
            events,
            entries,
            collections,
        }
    }
}

#[async_trait]
impl CommandHandler for MoveEntryToCollectionHandler {
    type Input = MoveEntryToCollectionInput;

    /// Appends the add before the remove, as one batch, so the entry is
    /// never without the target membership. The removal leaves a ghost.
    async fn handle(&self, input: Self::Input) -> Result<()> {
        let entry = live_entry(&self.entries, &input.entry_id)?;
        let target = real_target(&self.collections, &input.to_collection_id)?;

        let source = match real_collection_id(input.from_collection_id.as_deref()) {
            Some(from) => {
                if !entry.is_in(from) {
                    return Err(Error::Validation(format!(
                        "entry {} is not in collection {from}",
                        input.entry_id
                    )));
                }
                Some(from.to_string())
            }
            None if input.from_collection_id.is_some() => None,
            None => entry.collection_id().map(str::to_string),
        };
        if source.as_deref() == Some(target.as_str()) {
            return Err(Error::Validation(
                "entry is already in that collection".to_string(),
            ));
        }

        let mut events = Vec::with_capacity(2);
        if !entry.is_in(&target) {
            events.push(DomainEvent::new(EventPayload::EntryAddedToCollection {
                entry_id: input.entry_id.clone(),
                collection_id: target.clone(),
            }));
        }
        if let Some(source) = source {
            events.push(DomainEvent::new(
                EventPayload::EntryRemovedFromCollection {
                    entry_id: input.entry_id,
                    collection_id: source,
                    moved_to: Some(target),
                },
            ));
        }
        self.events.append_batch(&events).await
    }
}
