//! Collection model

use serde::{Deserialize, Serialize};

/// Id of the virtual collection holding entries with no membership.
pub const UNCATEGORIZED_COLLECTION_ID: &str = "uncategorized";

/// Sort key of the virtual collection; sorts before every fractional key.
pub const UNCATEGORIZED_ORDER: &str = "!";

/// Collection kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    /// One log per calendar day (`date` = `YYYY-MM-DD`)
    Daily,
    /// One log per calendar month (`date` = `YYYY-MM`)
    Monthly,
    /// User-named list
    Custom,
    /// Free-form log
    Log,
}

impl CollectionType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
            Self::Custom => "custom",
            Self::Log => "log",
        }
    }

    /// Daily and monthly collections are identified by their date.
    pub const fn is_temporal(self) -> bool {
        matches!(self, Self::Daily | Self::Monthly)
    }
}

/// How completed tasks are shown in a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CompletedTaskBehavior {
    #[default]
    KeepInPlace,
    MoveToBottom,
    Collapse,
}

/// Per-collection overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSettings {
    pub completed_task_behavior: Option<CompletedTaskBehavior>,
}

/// A named group of entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub collection_type: CollectionType,
    pub date: Option<String>,
    /// Fractional index
    pub order: String,
    pub is_favorite: bool,
    pub settings: CollectionSettings,
    pub created_at: String,
    pub deleted_at: Option<String>,
}

impl Collection {
    /// The virtual collection synthesized at query time. Never persisted.
    #[must_use]
    pub fn uncategorized() -> Self {
        Self {
            id: UNCATEGORIZED_COLLECTION_ID.to_string(),
            name: "Uncategorized".to_string(),
            collection_type: CollectionType::Custom,
            date: None,
            order: UNCATEGORIZED_ORDER.to_string(),
            is_favorite: false,
            settings: CollectionSettings::default(),
            created_at: String::new(),
            deleted_at: None,
        }
    }

    pub fn is_virtual(&self) -> bool {
        self.id == UNCATEGORIZED_COLLECTION_ID
    }

    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncategorized_sorts_first() {
        let virtual_collection = Collection::uncategorized();
        assert!(virtual_collection.is_virtual());
        assert!(virtual_collection.order.as_str() < "0");
    }

    #[test]
    fn behavior_serializes_kebab_case() {
        let raw = serde_json::to_string(&CompletedTaskBehavior::MoveToBottom).unwrap();
        assert_eq!(raw, "\"move-to-bottom\"");
    }
}
