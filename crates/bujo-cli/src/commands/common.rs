use std::collections::HashMap;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use bujo_core::config::AppConfig;
use bujo_core::models::{Collection, CollectionEntry, Entry, EntryBody, EntryKind, TaskStatus};
use bujo_core::JournalService;
use serde::Serialize;

use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub id: String,
    pub kind: &'static str,
    pub text: String,
    pub status: Option<&'static str>,
    pub event_date: Option<String>,
    pub collections: Vec<String>,
    pub parent_entry_id: Option<String>,
    pub migrated_to: Option<String>,
    /// Set when the row is a ghost left behind by a move
    pub moved_to: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct CollectionListItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub collection_type: &'static str,
    pub date: Option<String>,
    pub favorite: bool,
    pub open_tasks: usize,
}

/// Config file, then environment, then command-line flags.
pub fn resolve_config(
    config_path: Option<PathBuf>,
    db_path: Option<PathBuf>,
) -> Result<AppConfig, CliError> {
    let mut config = match config_path.or_else(default_config_path) {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::default(),
    };
    config.apply_env_overrides();
    if let Some(path) = db_path {
        config.database_path = Some(path);
    }
    if config.database_path.is_none() {
        config.database_path = Some(default_db_path());
    }
    // One-shot process: sync only when asked to.
    config.sync.background = false;
    config.validate()?;
    Ok(config)
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bujo").join("config.json"))
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bujo")
        .join("bujo.db")
}

pub async fn open_journal(config: &AppConfig) -> Result<JournalService, CliError> {
    Ok(JournalService::open(config.clone()).await?)
}

pub fn resolve_entry_text(text_parts: &[String]) -> Result<String, CliError> {
    if let Some(text) = normalize_content(&text_parts.join(" ")) {
        return Ok(text);
    }

    if let Some(text) = read_piped_stdin()? {
        return Ok(text);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyIdentifier)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

/// Find an entry, live or deleted, by full id or unique id prefix.
pub fn resolve_entry(journal: &JournalService, query: &str) -> Result<Entry, CliError> {
    let query = normalize_identifier(query)?;
    if let Some(entry) = journal.entries().get_entry(&query) {
        return Ok(entry);
    }

    let matching_ids: Vec<String> = journal.entries().read(|list| {
        list.iter()
            .filter(|entry| entry.id.starts_with(&query))
            .map(|entry| entry.id.clone())
            .collect()
    });
    let id = pick_unique(&query, matching_ids, || CliError::EntryNotFound(query.clone()))?;
    journal
        .entries()
        .get_entry(&id)
        .ok_or_else(|| CliError::EntryNotFound(query.clone()))
}

/// Find a collection by full id, unique id prefix or case-insensitive name.
pub fn resolve_collection(journal: &JournalService, query: &str) -> Result<Collection, CliError> {
    let query = normalize_identifier(query)?;
    let collections = journal.collections();
    if let Some(collection) = collections.get_collection(&query) {
        return Ok(collection);
    }

    let live = collections.get_collections();
    let by_prefix: Vec<String> = live
        .iter()
        .chain(collections.get_deleted_collections().iter())
        .filter(|collection| collection.id.starts_with(&query))
        .map(|collection| collection.id.clone())
        .collect();
    let ids = if by_prefix.is_empty() {
        live.iter()
            .filter(|collection| collection.name.eq_ignore_ascii_case(&query))
            .map(|collection| collection.id.clone())
            .collect()
    } else {
        by_prefix
    };

    let id = pick_unique(&query, ids, || CliError::CollectionNotFound(query.clone()))?;
    collections
        .get_collection(&id)
        .ok_or_else(|| CliError::CollectionNotFound(query.clone()))
}

fn pick_unique(
    query: &str,
    mut ids: Vec<String>,
    not_found: impl FnOnce() -> CliError,
) -> Result<String, CliError> {
    match ids.len() {
        0 => Err(not_found()),
        1 => Ok(ids.remove(0)),
        _ => {
            let options = ids
                .iter()
                .take(3)
                .map(|id| short_id(id))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousIdentifier(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

/// Rapid-logging signifier for an entry.
pub fn entry_bullet(entry: &Entry) -> &'static str {
    if entry.is_migrated() {
        return ">";
    }
    match (entry.kind(), entry.status()) {
        (EntryKind::Task, Some(TaskStatus::Completed)) => "x",
        (EntryKind::Task, _) => "•",
        (EntryKind::Note, _) => "-",
        (EntryKind::Event, _) => "o",
    }
}

const fn kind_name(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Task => "task",
        EntryKind::Note => "note",
        EntryKind::Event => "event",
    }
}

const fn status_name(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Open => "open",
        TaskStatus::Completed => "completed",
    }
}

pub fn entry_preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

fn event_date(entry: &Entry) -> Option<String> {
    match &entry.body {
        EntryBody::Event { event_date, .. } => event_date.clone(),
        _ => None,
    }
}

pub fn format_entry_lines(rows: &[CollectionEntry], names: &HashMap<String, String>) -> Vec<String> {
    rows.iter()
        .map(|row| {
            let entry = &row.entry;
            let id = short_id(&entry.id);
            let indent = if entry.parent_entry_id.is_some() { "  " } else { "" };
            let preview = entry_preview(entry.text(), 50);

            if let Some(target) = &row.ghost_of {
                let target = names.get(target).map_or(target.as_str(), String::as_str);
                return format!("{id:<13}  {indent}< {preview}  (moved to {target})");
            }
            match event_date(entry) {
                Some(date) => format!("{id:<13}  {indent}{} {preview}  [{date}]", entry_bullet(entry)),
                None => format!("{id:<13}  {indent}{} {preview}", entry_bullet(entry)),
            }
        })
        .collect()
}

pub fn entry_to_list_item(row: &CollectionEntry) -> EntryListItem {
    let entry = &row.entry;
    EntryListItem {
        id: entry.id.clone(),
        kind: kind_name(entry.kind()),
        text: entry.text().to_string(),
        status: entry.status().map(status_name),
        event_date: event_date(entry),
        collections: entry.collections.clone(),
        parent_entry_id: entry.parent_entry_id.clone(),
        migrated_to: entry.migrated_to.clone(),
        moved_to: row.ghost_of.clone(),
        created_at: entry.created_at.clone(),
    }
}

pub fn collection_to_list_item(
    collection: &Collection,
    favorite: bool,
    open_tasks: &HashMap<String, usize>,
) -> CollectionListItem {
    CollectionListItem {
        id: collection.id.clone(),
        name: collection.name.clone(),
        collection_type: collection.collection_type.as_str(),
        date: collection.date.clone(),
        favorite,
        open_tasks: open_tasks.get(&collection.id).copied().unwrap_or(0),
    }
}

pub fn format_collection_lines(items: &[CollectionListItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let id = short_id(&item.id);
            let star = if item.favorite { "*" } else { " " };
            let name = match &item.date {
                Some(date) => format!("{} ({date})", item.name),
                None => item.name.clone(),
            };
            format!(
                "{id:<13}  {star} {name:<30}  {:<8}  {} open",
                item.collection_type, item.open_tasks
            )
        })
        .collect()
}
