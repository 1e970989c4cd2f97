//! Collection commands

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{live_collection, required_text, CommandHandler, IdInput};
use crate::error::{Error, Result};
use crate::fractional;
use crate::models::{CollectionType, CompletedTaskBehavior, DomainEvent, EventPayload};
use crate::projection::CollectionListProjection;
use crate::store::EventStore;
use crate::util::new_id;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCollectionInput {
    /// Caller-chosen id so the caller can refer to the new collection
    pub id: String,
    pub name: String,
    pub collection_type: CollectionType,
    /// `YYYY-MM-DD` for daily logs, `YYYY-MM` for monthly logs
    pub date: Option<String>,
}

impl CreateCollectionInput {
    pub fn new(name: impl Into<String>, collection_type: CollectionType) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            collection_type,
            date: None,
        }
    }

    #[must_use]
    pub fn on(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}

fn validate_date(collection_type: CollectionType, date: Option<&str>) -> Result<Option<String>> {
    let date = date.map(str::trim).filter(|date| !date.is_empty());
    match (collection_type, date) {
        (CollectionType::Daily, Some(date)) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(|_| Some(date.to_string()))
            .map_err(|_| Error::Validation(format!("daily log date must be YYYY-MM-DD: {date}"))),
        (CollectionType::Monthly, Some(date)) => {
            NaiveDate::parse_from_str(&format!("{date}-01"), "%Y-%m-%d")
                .map(|_| Some(date.to_string()))
                .map_err(|_| Error::Validation(format!("monthly log date must be YYYY-MM: {date}")))
        }
        (CollectionType::Daily | CollectionType::Monthly, None) => Err(Error::Validation(
            "daily and monthly logs require a date".to_string(),
        )),
        (_, date) => Ok(date.map(str::to_string)),
    }
}

pub struct CreateCollectionHandler {
    events: Arc<dyn EventStore>,
    collections: Arc<CollectionListProjection>,
}

impl CreateCollectionHandler {
    pub fn new(events: Arc<dyn EventStore>, collections: Arc<CollectionListProjection>) -> Self {
        Self {
            events,
            collections,
        }
    }
}

#[async_trait]
impl CommandHandler for CreateCollectionHandler {
    type Input = CreateCollectionInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        let name = required_text(&input.name, "collection name")?;
        let date = validate_date(input.collection_type, input.date.as_deref())?;
        if let Some(date) = date.as_deref() {
            if input.collection_type.is_temporal()
                && self
                    .collections
                    .get_collection_by_date(input.collection_type, date)
                    .is_some()
            {
                return Err(Error::Validation(format!(
                    "a {} log for {date} already exists",
                    input.collection_type.as_str()
                )));
            }
        }
        if self.collections.get_collection(&input.id).is_some() {
            return Err(Error::Validation(format!(
                "collection {} already exists",
                input.id
            )));
        }

        let last = self
            .collections
            .get_collections()
            .into_iter()
            .map(|collection| collection.order)
            .max();
        let order = fractional::key_between(last.as_deref(), None)?;

        self.events
            .append(&DomainEvent::new(EventPayload::CollectionCreated {
                collection_id: input.id,
                name,
                collection_type: input.collection_type,
                date,
                order,
            }))
            .await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameCollectionInput {
    pub collection_id: String,
    pub name: String,
}

pub struct RenameCollectionHandler {
    events: Arc<dyn EventStore>,
    collections: Arc<CollectionListProjection>,
}

impl RenameCollectionHandler {
    pub fn new(events: Arc<dyn EventStore>, collections: Arc<CollectionListProjection>) -> Self {
        Self {
            events,
            collections,
        }
    }
}

#[async_trait]
impl CommandHandler for RenameCollectionHandler {
    type Input = RenameCollectionInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        let name = required_text(&input.name, "collection name")?;
        let collection = live_collection(&self.collections, &input.collection_id)?;
        if collection.is_virtual() {
            return Err(Error::Validation(
                "the uncategorized collection cannot be renamed".to_string(),
            ));
        }
        if collection.name == name {
            return Ok(());
        }
        self.events
            .append(&DomainEvent::new(EventPayload::CollectionRenamed {
                collection_id: input.collection_id,
                name,
            }))
            .await
    }
}

pub struct DeleteCollectionHandler {
    events: Arc<dyn EventStore>,
    collections: Arc<CollectionListProjection>,
}

impl DeleteCollectionHandler {
    pub fn new(events: Arc<dyn EventStore>, collections: Arc<CollectionListProjection>) -> Self {
        Self {
            events,
            collections,
        }
    }
}

#[async_trait]
impl CommandHandler for DeleteCollectionHandler {
    type Input = IdInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        let collection = live_collection(&self.collections, &input.id)?;
        if collection.is_virtual() {
            return Err(Error::Validation(
                "the uncategorized collection cannot be deleted".to_string(),
            ));
        }
        self.events
            .append(&DomainEvent::new(EventPayload::CollectionDeleted {
                collection_id: input.id,
            }))
            .await
    }
}

pub struct RestoreCollectionHandler {
    events: Arc<dyn EventStore>,
    collections: Arc<CollectionListProjection>,
}

impl RestoreCollectionHandler {
    pub fn new(events: Arc<dyn EventStore>, collections: Arc<CollectionListProjection>) -> Self {
        Self {
            events,
            collections,
        }
    }
}

#[async_trait]
impl CommandHandler for RestoreCollectionHandler {
    type Input = IdInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        let collection = self
            .collections
            .get_collection(&input.id)
            .ok_or_else(|| Error::NotFound(format!("collection {}", input.id)))?;
        if !collection.is_deleted() {
            return Err(Error::Validation(format!(
                "collection {} is not deleted",
                input.id
            )));
        }
        self.events
            .append(&DomainEvent::new(EventPayload::CollectionRestored {
                collection_id: input.id,
            }))
            .await
    }
}

/// Place a collection between two neighbors (`None` means the list edge).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderCollectionInput {
    pub collection_id: String,
    pub previous_collection_id: Option<String>,
    pub next_collection_id: Option<String>,
}

pub struct ReorderCollectionHandler {
    events: Arc<dyn EventStore>,
    collections: Arc<CollectionListProjection>,
}

impl ReorderCollectionHandler {
    pub fn new(events: Arc<dyn EventStore>, collections: Arc<CollectionListProjection>) -> Self {
        Self {
            events,
            collections,
        }
    }

    fn neighbor_order(&self, collection_id: Option<&str>) -> Result<Option<String>> {
        collection_id
            .map(|id| live_collection(&self.collections, id).map(|collection| collection.order))
            .transpose()
    }
}

#[async_trait]
impl CommandHandler for ReorderCollectionHandler {
    type Input = ReorderCollectionInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        let collection = live_collection(&self.collections, &input.collection_id)?;
        if collection.is_virtual() {
            return Err(Error::Validation(
                "the uncategorized collection cannot be reordered".to_string(),
            ));
        }
        let previous = self.neighbor_order(input.previous_collection_id.as_deref())?;
        let next = self.neighbor_order(input.next_collection_id.as_deref())?;
        let order = fractional::key_between(previous.as_deref(), next.as_deref())?;

        self.events
            .append(&DomainEvent::new(EventPayload::CollectionReordered {
                collection_id: input.collection_id,
                order,
            }))
            .await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCollectionSettingsInput {
    pub collection_id: String,
    /// `None` clears the override so the user default applies
    pub completed_task_behavior: Option<CompletedTaskBehavior>,
}

pub struct UpdateCollectionSettingsHandler {
    events: Arc<dyn EventStore>,
    collections: Arc<CollectionListProjection>,
}

impl UpdateCollectionSettingsHandler {
    pub fn new(events: Arc<dyn EventStore>, collections: Arc<CollectionListProjection>) -> Self {
        Self {
            events,
            collections,
        }
    }
}

#[async_trait]
impl CommandHandler for UpdateCollectionSettingsHandler {
    type Input = UpdateCollectionSettingsInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        let collection = live_collection(&self.collections, &input.collection_id)?;
        if collection.is_virtual() {
            return Err(Error::Validation(
                "the uncategorized collection has no settings".to_string(),
            ));
        }
        self.events
            .append(&DomainEvent::new(EventPayload::CollectionSettingsUpdated {
                collection_id: input.collection_id,
                completed_task_behavior: input.completed_task_behavior,
            }))
            .await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteCollectionInput {
    pub collection_id: String,
    pub favorite: bool,
}

pub struct FavoriteCollectionHandler {
    events: Arc<dyn EventStore>,
    collections: Arc<CollectionListProjection>,
}

impl FavoriteCollectionHandler {
    pub fn new(events: Arc<dyn EventStore>, collections: Arc<CollectionListProjection>) -> Self {
        Self {
            events,
            collections,
        }
    }
}

#[async_trait]
impl CommandHandler for FavoriteCollectionHandler {
    type Input = FavoriteCollectionInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        let collection = live_collection(&self.collections, &input.collection_id)?;
        if collection.is_virtual() {
            return Err(Error::Validation(
                "the uncategorized collection cannot be favorited".to_string(),
            ));
        }
        if collection.is_favorite == input.favorite {
            return Ok(());
        }

        let collection_id = input.collection_id;
        let payload = if input.favorite {
            EventPayload::CollectionFavorited { collection_id }
        } else {
            EventPayload::CollectionUnfavorited { collection_id }
        };
        self.events.append(&DomainEvent::new(payload)).await
    }
}
