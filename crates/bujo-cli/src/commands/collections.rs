use bujo_core::commands::{CommandHandler, CreateCollectionInput};
use bujo_core::config::AppConfig;
use bujo_core::models::CollectionType;
use bujo_core::JournalService;
use chrono::Local;

use crate::cli::CollectionTypeArg;
use crate::commands::common::{
    collection_to_list_item, format_collection_lines, normalize_content, open_journal,
    CollectionListItem,
};
use crate::error::CliError;

impl From<CollectionTypeArg> for CollectionType {
    fn from(value: CollectionTypeArg) -> Self {
        match value {
            CollectionTypeArg::Daily => Self::Daily,
            CollectionTypeArg::Monthly => Self::Monthly,
            CollectionTypeArg::Custom => Self::Custom,
            CollectionTypeArg::Log => Self::Log,
        }
    }
}

pub async fn run_collections(as_json: bool, config: &AppConfig) -> Result<(), CliError> {
    let journal = open_journal(config).await?;
    let items = list_collections(&journal);
    journal.shutdown().await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_collection_lines(&items) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Every live collection, uncategorized first, with favorites flagged.
pub fn list_collections(journal: &JournalService) -> Vec<CollectionListItem> {
    let preferences = journal.preferences().get();
    let today = Local::now().date_naive();
    let favorites: Vec<String> = journal
        .collections()
        .get_favorites(&preferences, today)
        .into_iter()
        .map(|collection| collection.id)
        .collect();
    let open_tasks = journal.entries().get_active_task_counts_by_collection();

    journal
        .collections()
        .get_collections_with_uncategorized(true)
        .iter()
        .map(|collection| {
            collection_to_list_item(collection, favorites.contains(&collection.id), &open_tasks)
        })
        .collect()
}

pub async fn run_collection_create(
    name_parts: &[String],
    collection_type: CollectionTypeArg,
    date: Option<String>,
    config: &AppConfig,
) -> Result<(), CliError> {
    let name = normalize_content(&name_parts.join(" ")).ok_or(CliError::EmptyContent)?;
    let mut input = CreateCollectionInput::new(name, collection_type.into());
    if let Some(date) = date {
        input = input.on(date);
    }
    let id = input.id.clone();

    let journal = open_journal(config).await?;
    let result = journal.handlers().create_collection.handle(input).await;
    journal.shutdown().await;

    result?;
    println!("{id}");
    Ok(())
}
