//! Collection list read model

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{Projection, Reducer};
use crate::models::{
    Collection, CollectionSettings, CollectionType, CompletedTaskBehavior, DomainEvent,
    EventPayload, UserPreferences, UNCATEGORIZED_COLLECTION_ID,
};
use crate::store::COLLECTION_LIST_SNAPSHOT_KEY;

/// Collections keyed by id, including soft-deleted ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionList {
    collections: BTreeMap<String, Collection>,
}

impl Reducer for CollectionList {
    const SNAPSHOT_KEY: &'static str = COLLECTION_LIST_SNAPSHOT_KEY;
    const SNAPSHOT_VERSION: u32 = 1;

    fn apply(&mut self, event: &DomainEvent) -> bool {
        let at = event.timestamp.as_str();
        match &event.payload {
            EventPayload::CollectionCreated {
                collection_id,
                name,
                collection_type,
                date,
                order,
            } => {
                if self.collections.contains_key(collection_id) {
                    return false;
                }
                self.collections.insert(
                    collection_id.clone(),
                    Collection {
                        id: collection_id.clone(),
                        name: name.clone(),
                        collection_type: *collection_type,
                        date: date.clone(),
                        order: order.clone(),
                        is_favorite: false,
                        settings: CollectionSettings::default(),
                        created_at: at.to_string(),
                        deleted_at: None,
                    },
                );
                true
            }
            EventPayload::CollectionRenamed {
                collection_id,
                name,
            } => self.update(collection_id, |collection| {
                set(&mut collection.name, name.clone())
            }),
            EventPayload::CollectionReordered {
                collection_id,
                order,
            } => self.update(collection_id, |collection| {
                set(&mut collection.order, order.clone())
            }),
            EventPayload::CollectionDeleted { collection_id } => {
                self.update(collection_id, |collection| {
                    if collection.is_deleted() {
                        return false;
                    }
                    collection.deleted_at = Some(at.to_string());
                    true
                })
            }
            EventPayload::CollectionRestored { collection_id } => {
                self.update(collection_id, |collection| {
                    collection.deleted_at.take().is_some()
                })
            }
            EventPayload::CollectionFavorited { collection_id } => {
                self.update(collection_id, |collection| {
                    set(&mut collection.is_favorite, true)
                })
            }
            EventPayload::CollectionUnfavorited { collection_id } => {
                self.update(collection_id, |collection| {
                    set(&mut collection.is_favorite, false)
                })
            }
            EventPayload::CollectionSettingsUpdated {
                collection_id,
                completed_task_behavior,
            } => self.update(collection_id, |collection| {
                set(
                    &mut collection.settings.completed_task_behavior,
                    *completed_task_behavior,
                )
            }),
            _ => false,
        }
    }
}

impl CollectionList {
    fn update(&mut self, collection_id: &str, change: impl FnOnce(&mut Collection) -> bool) -> bool {
        self.collections.get_mut(collection_id).is_some_and(change)
    }

    fn live(&self) -> impl Iterator<Item = &Collection> {
        self.collections
            .values()
            .filter(|collection| !collection.is_deleted())
    }
}

fn set<T: PartialEq>(current: &mut T, next: T) -> bool {
    if *current == next {
        return false;
    }
    *current = next;
    true
}

fn by_order(mut collections: Vec<Collection>) -> Vec<Collection> {
    collections.sort_by(|left, right| {
        left.order
            .cmp(&right.order)
            .then_with(|| left.created_at.cmp(&right.created_at))
            .then_with(|| left.id.cmp(&right.id))
    });
    collections
}

/// The collection's own setting wins over the user default.
pub fn effective_completed_task_behavior(
    collection: &Collection,
    preferences: &UserPreferences,
) -> CompletedTaskBehavior {
    collection
        .settings
        .completed_task_behavior
        .unwrap_or(preferences.default_completed_task_behavior)
}

fn is_auto_favorite(collection: &Collection, preferences: &UserPreferences, today: NaiveDate) -> bool {
    let Some(date) = collection.date.as_deref() else {
        return false;
    };
    match collection.collection_type {
        CollectionType::Daily if preferences.auto_favorite_recent_daily_logs => {
            let Ok(day) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
                return false;
            };
            (day - today).num_days().abs() <= 1
        }
        CollectionType::Monthly if preferences.auto_favorite_recent_monthly_logs => {
            date == format!("{:04}-{:02}", today.year(), today.month())
        }
        _ => false,
    }
}

impl Projection<CollectionList> {
    /// Live collections in fractional order.
    pub fn get_collections(&self) -> Vec<Collection> {
        by_order(self.read(|list| list.live().cloned().collect()))
    }

    /// Soft-deleted collections.
    pub fn get_deleted_collections(&self) -> Vec<Collection> {
        by_order(self.read(|list| {
            list.collections
                .values()
                .filter(|collection| collection.is_deleted())
                .cloned()
                .collect()
        }))
    }

    /// Any known collection, deleted or not. `"uncategorized"` yields the
    /// virtual collection.
    pub fn get_collection(&self, collection_id: &str) -> Option<Collection> {
        if collection_id == UNCATEGORIZED_COLLECTION_ID {
            return Some(Collection::uncategorized());
        }
        self.read(|list| list.collections.get(collection_id).cloned())
    }

    /// The live daily or monthly log for `date`.
    pub fn get_collection_by_date(
        &self,
        collection_type: CollectionType,
        date: &str,
    ) -> Option<Collection> {
        self.read(|list| {
            list.live()
                .find(|collection| {
                    collection.collection_type == collection_type
                        && collection.date.as_deref() == Some(date)
                })
                .cloned()
        })
    }

    pub fn get_collections_with_uncategorized(&self, include_uncategorized: bool) -> Vec<Collection> {
        let mut collections = self.get_collections();
        if include_uncategorized {
            collections.insert(0, Collection::uncategorized());
        }
        collections
    }

    /// Explicit favorites plus recent logs when auto-favoriting is enabled.
    pub fn get_favorites(&self, preferences: &UserPreferences, today: NaiveDate) -> Vec<Collection> {
        by_order(self.read(|list| {
            list.live()
                .filter(|collection| {
                    collection.is_favorite || is_auto_favorite(collection, preferences, today)
                })
                .cloned()
                .collect()
        }))
    }

    /// Effective behavior for `collection_id`; the user default when unknown.
    pub fn get_completed_task_behavior(
        &self,
        collection_id: &str,
        preferences: &UserPreferences,
    ) -> CompletedTaskBehavior {
        self.get_collection(collection_id).map_or(
            preferences.default_completed_task_behavior,
            |collection| effective_completed_task_behavior(&collection, preferences),
        )
    }
}
