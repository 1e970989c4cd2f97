use std::collections::HashMap;

use bujo_core::config::AppConfig;
use bujo_core::models::{CollectionEntry, UNCATEGORIZED_COLLECTION_ID};
use bujo_core::JournalService;

use crate::commands::common::{
    entry_to_list_item, format_entry_lines, open_journal, resolve_collection, EntryListItem,
};
use crate::error::CliError;

pub async fn run_list(
    collection: Option<&str>,
    as_json: bool,
    config: &AppConfig,
) -> Result<(), CliError> {
    let journal = open_journal(config).await?;
    let result = collection_rows(&journal, collection);
    let names = collection_names(&journal);
    journal.shutdown().await;
    let rows = result?;

    if as_json {
        let json_items = rows
            .iter()
            .map(entry_to_list_item)
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_entry_lines(&rows, &names) {
            println!("{line}");
        }
    }

    Ok(())
}

/// Members arranged by the effective completed-task behavior, then ghosts.
pub fn collection_rows(
    journal: &JournalService,
    collection: Option<&str>,
) -> Result<Vec<CollectionEntry>, CliError> {
    let collection_id = match collection {
        Some(query) => resolve_collection(journal, query)?.id,
        None => UNCATEGORIZED_COLLECTION_ID.to_string(),
    };
    let preferences = journal.preferences().get();
    let behavior = journal
        .collections()
        .get_completed_task_behavior(&collection_id, &preferences);

    let members = journal
        .entries()
        .get_entries_for_display(&collection_id, behavior)
        .into_iter()
        .map(|entry| CollectionEntry {
            entry,
            ghost_of: None,
        });
    let ghosts = journal
        .entries()
        .get_collection_view(&collection_id)
        .into_iter()
        .filter(CollectionEntry::is_ghost);
    Ok(members.chain(ghosts).collect())
}

fn collection_names(journal: &JournalService) -> HashMap<String, String> {
    journal
        .collections()
        .get_collections_with_uncategorized(true)
        .into_iter()
        .map(|collection| (collection.id, collection.name))
        .collect()
}
