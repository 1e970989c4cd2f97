use bujo_core::commands::{CommandHandler, CreateEntryInput};
use bujo_core::config::AppConfig;
use bujo_core::JournalService;

use crate::cli::EntryKindArg;
use crate::commands::common::{open_journal, resolve_collection, resolve_entry, resolve_entry_text};
use crate::error::CliError;

pub struct AddArgs<'a> {
    pub kind: EntryKindArg,
    pub text: &'a [String],
    pub collection: Option<&'a str>,
    pub parent: Option<&'a str>,
    pub date: Option<&'a str>,
}

pub async fn run_add(args: AddArgs<'_>, config: &AppConfig) -> Result<(), CliError> {
    let text = resolve_entry_text(args.text)?;
    let journal = open_journal(config).await?;
    let result = add_entry(&journal, &args, text).await;
    journal.shutdown().await;

    println!("{}", result?);
    Ok(())
}

async fn add_entry(
    journal: &JournalService,
    args: &AddArgs<'_>,
    text: String,
) -> Result<String, CliError> {
    let mut input = CreateEntryInput::new(text);
    if let Some(collection) = args.collection {
        input = input.in_collection(resolve_collection(journal, collection)?.id);
    }
    if let Some(parent) = args.parent {
        input = input.under(resolve_entry(journal, parent)?.id);
    }
    if let Some(date) = args.date {
        input = input.on(date);
    }
    let id = input.id.clone();

    let handlers = journal.handlers();
    match args.kind {
        EntryKindArg::Task => handlers.create_task.handle(input).await?,
        EntryKindArg::Note => handlers.create_note.handle(input).await?,
        EntryKindArg::Event => handlers.create_event.handle(input).await?,
    }
    Ok(id)
}
