//! Migration: carry an entry forward into another collection

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::{last_entry_order, live_collection, live_entry, real_collection_id, CommandHandler};
use crate::error::{Error, Result};
use crate::fractional;
use crate::models::{DomainEvent, Entry, EventPayload};
use crate::projection::{CollectionListProjection, EntryListProjection};
use crate::store::EventStore;
use crate::util::new_id;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrateEntryInput {
    pub entry_id: String,
    pub target_collection_id: String,
    /// Id of the copy created in the target collection
    pub new_entry_id: String,
}

impl MigrateEntryInput {
    pub fn new(entry_id: impl Into<String>, target_collection_id: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            target_collection_id: target_collection_id.into(),
            new_entry_id: new_id(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkMigrateEntriesInput {
    pub entry_ids: Vec<String>,
    pub target_collection_id: String,
}

struct Migrator {
    events: Arc<dyn EventStore>,
    entries: Arc<EntryListProjection>,
    collections: Arc<CollectionListProjection>,
}

impl Migrator {
    fn target(&self, collection_id: &str) -> Result<String> {
        let Some(collection_id) = real_collection_id(Some(collection_id)) else {
            return Err(Error::Validation(
                "cannot migrate into uncategorized".to_string(),
            ));
        };
        live_collection(&self.collections, collection_id)?;
        Ok(collection_id.to_string())
    }

    fn migratable(&self, entry_id: &str, target: &str) -> Result<Entry> {
        let entry = live_entry(&self.entries, entry_id)?;
        if entry.is_migrated() {
            return Err(Error::Validation(format!(
                "entry {entry_id} was already migrated"
            )));
        }
        if entry.is_in(target) {
            return Err(Error::Validation(format!(
                "entry {entry_id} is already in collection {target}"
            )));
        }
        Ok(entry)
    }
}

pub struct MigrateEntryHandler {
    migrator: Migrator,
}

impl MigrateEntryHandler {
    pub fn new(
        events: Arc<dyn EventStore>,
        entries: Arc<EntryListProjection>,
        collections: Arc<CollectionListProjection>,
    ) -> Self {
        Self {
            migrator: Migrator {
                events,
                entries,
                collections,
            },
        }
    }
}

#[async_trait]
impl CommandHandler for MigrateEntryHandler {
    type Input = MigrateEntryInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        let migrator = &self.migrator;
        let target = migrator.target(&input.target_collection_id)?;
        migrator.migratable(&input.entry_id, &target)?;
        if migrator.entries.get_entry(&input.new_entry_id).is_some() {
            return Err(Error::Validation(format!(
                "entry {} already exists",
                input.new_entry_id
            )));
        }

        let last = last_entry_order(&migrator.entries, &target);
        let order = fractional::key_between(last.as_deref(), None)?;
        migrator
            .events
            .append(&DomainEvent::new(EventPayload::EntryMigrated {
                entry_id: input.entry_id,
                new_entry_id: input.new_entry_id,
                target_collection_id: target,
                order: Some(order),
            }))
            .await
    }
}

pub struct BulkMigrateEntriesHandler {
    migrator: Migrator,
}

impl BulkMigrateEntriesHandler {
    pub fn new(
        events: Arc<dyn EventStore>,
        entries: Arc<EntryListProjection>,
        collections: Arc<CollectionListProjection>,
    ) -> Self {
        Self {
            migrator: Migrator {
                events,
                entries,
                collections,
            },
        }
    }
}

#[async_trait]
impl CommandHandler for BulkMigrateEntriesHandler {
    type Input = BulkMigrateEntriesInput;

    /// Validates every entry before appending anything; the migrations
    /// land as one batch in input order.
    async fn handle(&self, input: Self::Input) -> Result<()> {
        let migrator = &self.migrator;
        if input.entry_ids.is_empty() {
            return Err(Error::Validation("no entries to migrate".to_string()));
        }
        let target = migrator.target(&input.target_collection_id)?;

        let mut seen = HashSet::new();
        for entry_id in &input.entry_ids {
            if !seen.insert(entry_id.as_str()) {
                return Err(Error::Validation(format!(
                    "entry {entry_id} is listed twice"
                )));
            }
            migrator.migratable(entry_id, &target)?;
        }

        let last = last_entry_order(&migrator.entries, &target);
        let orders = fractional::keys_after(last.as_deref(), input.entry_ids.len())?;
        let events: Vec<DomainEvent> = input
            .entry_ids
            .into_iter()
            .zip(orders)
            .map(|(entry_id, order)| {
                DomainEvent::new(EventPayload::EntryMigrated {
                    entry_id,
                    new_entry_id: new_id(),
                    target_collection_id: target.clone(),
                    order: Some(order),
                })
            })
            .collect();

        tracing::info!(
            count = events.len(),
            target_collection_id = %target,
            "Migrating entries"
        );
        migrator.events.append_batch(&events).await
    }
}
