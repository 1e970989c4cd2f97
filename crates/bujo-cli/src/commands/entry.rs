use bujo_core::commands::{CommandHandler, EditEntryInput, IdInput};
use bujo_core::config::AppConfig;
use bujo_core::JournalService;

use crate::commands::common::{normalize_content, open_journal, resolve_entry};
use crate::error::CliError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntryAction {
    Complete,
    Reopen,
    Delete,
    Restore,
}

pub async fn run_entry_action(
    action: EntryAction,
    id: &str,
    config: &AppConfig,
) -> Result<(), CliError> {
    let journal = open_journal(config).await?;
    let result = apply_action(&journal, action, id).await;
    journal.shutdown().await;

    println!("{}", result?);
    Ok(())
}

async fn apply_action(
    journal: &JournalService,
    action: EntryAction,
    id: &str,
) -> Result<String, CliError> {
    let entry = resolve_entry(journal, id)?;
    let input = IdInput::new(entry.id.clone());
    let handlers = journal.handlers();
    match action {
        EntryAction::Complete => handlers.complete_task.handle(input).await?,
        EntryAction::Reopen => handlers.reopen_task.handle(input).await?,
        EntryAction::Delete => handlers.delete_entry.handle(input).await?,
        EntryAction::Restore => handlers.restore_entry.handle(input).await?,
    }
    Ok(entry.id)
}

pub async fn run_edit(
    id: &str,
    text_parts: &[String],
    date: Option<Option<String>>,
    config: &AppConfig,
) -> Result<(), CliError> {
    let text = normalize_content(&text_parts.join(" "));
    if text.is_none() && date.is_none() {
        return Err(CliError::EmptyContent);
    }

    let journal = open_journal(config).await?;
    let result = edit_entry(&journal, id, text, date).await;
    journal.shutdown().await;

    println!("{}", result?);
    Ok(())
}

async fn edit_entry(
    journal: &JournalService,
    id: &str,
    text: Option<String>,
    event_date: Option<Option<String>>,
) -> Result<String, CliError> {
    let entry = resolve_entry(journal, id)?;
    journal
        .handlers()
        .edit_entry
        .handle(EditEntryInput {
            entry_id: entry.id.clone(),
            text,
            event_date,
        })
        .await?;
    Ok(entry.id)
}
