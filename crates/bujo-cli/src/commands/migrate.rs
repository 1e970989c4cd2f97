use bujo_core::commands::{
    BulkMigrateEntriesInput, CommandHandler, MembershipInput, MigrateEntryInput,
    MoveEntryToCollectionInput,
};
use bujo_core::config::AppConfig;
use bujo_core::JournalService;

use crate::commands::common::{open_journal, resolve_collection, resolve_entry};
use crate::error::CliError;

pub async fn run_migrate(
    entries: &[String],
    target: &str,
    config: &AppConfig,
) -> Result<(), CliError> {
    let journal = open_journal(config).await?;
    let result = migrate(&journal, entries, target).await;
    journal.shutdown().await;

    for id in result? {
        println!("{id}");
    }
    Ok(())
}

/// Migrate one entry or a batch; returns the ids of the new copies.
async fn migrate(
    journal: &JournalService,
    entries: &[String],
    target: &str,
) -> Result<Vec<String>, CliError> {
    let target_id = resolve_collection(journal, target)?.id;
    let entry_ids = entries
        .iter()
        .map(|query| resolve_entry(journal, query).map(|entry| entry.id))
        .collect::<Result<Vec<String>, CliError>>()?;

    let handlers = journal.handlers();
    if let [entry_id] = entry_ids.as_slice() {
        let input = MigrateEntryInput::new(entry_id.clone(), target_id);
        let new_id = input.new_entry_id.clone();
        handlers.migrate_entry.handle(input).await?;
        return Ok(vec![new_id]);
    }

    handlers
        .bulk_migrate
        .handle(BulkMigrateEntriesInput {
            entry_ids: entry_ids.clone(),
            target_collection_id: target_id,
        })
        .await?;
    Ok(entry_ids
        .iter()
        .filter_map(|id| journal.entries().get_entry(id))
        .filter_map(|entry| entry.migrated_to)
        .collect())
}

pub async fn run_move(
    entry: &str,
    from: Option<&str>,
    to: &str,
    config: &AppConfig,
) -> Result<(), CliError> {
    let journal = open_journal(config).await?;
    let result = move_entry(&journal, entry, from, to).await;
    journal.shutdown().await;

    println!("{}", result?);
    Ok(())
}

async fn move_entry(
    journal: &JournalService,
    entry: &str,
    from: Option<&str>,
    to: &str,
) -> Result<String, CliError> {
    let entry_id = resolve_entry(journal, entry)?.id;
    let from_collection_id = from
        .map(|query| resolve_collection(journal, query).map(|collection| collection.id))
        .transpose()?;
    let to_collection_id = resolve_collection(journal, to)?.id;

    journal
        .handlers()
        .move_to_collection
        .handle(MoveEntryToCollectionInput {
            entry_id: entry_id.clone(),
            from_collection_id,
            to_collection_id,
        })
        .await?;
    Ok(entry_id)
}

pub async fn run_link(entry: &str, collection: &str, config: &AppConfig) -> Result<(), CliError> {
    let journal = open_journal(config).await?;
    let result = link_entry(&journal, entry, collection).await;
    journal.shutdown().await;

    println!("{}", result?);
    Ok(())
}

async fn link_entry(
    journal: &JournalService,
    entry: &str,
    collection: &str,
) -> Result<String, CliError> {
    let entry_id = resolve_entry(journal, entry)?.id;
    let collection_id = resolve_collection(journal, collection)?.id;
    journal
        .handlers()
        .add_to_collection
        .handle(MembershipInput::new(entry_id.clone(), collection_id))
        .await?;
    Ok(entry_id)
}
