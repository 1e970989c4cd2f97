//! bujo CLI - Bullet journal from the command line
//!
//! Every command opens the local journal, applies its events and shuts the
//! journal down again; remote sync only happens through `bujo sync`.

mod cli;
mod commands;
mod error;


use bujo_core::commands::UpdateUserPreferencesInput;
use clap::Parser;

use crate::cli::{Cli, CollectionCommands, Commands};
use crate::commands::add::{run_add, AddArgs};
use crate::commands::collections::{run_collection_create, run_collections};
use crate::commands::common::resolve_config;
use crate::commands::completions::run_completions;
use crate::commands::entry::{run_edit, run_entry_action, EntryAction};
use crate::commands::list::run_list;
use crate::commands::migrate::{run_link, run_migrate, run_move};
use crate::commands::prefs::run_prefs;
use crate::commands::sync::{run_snapshot, run_sync};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "bujo=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let config = resolve_config(cli.config, cli.db_path)?;

    match cli.command {
        Commands::Add {
            kind,
            text,
            collection,
            parent,
            date,
        } => {
            let args = AddArgs {
                kind,
                text: &text,
                collection: collection.as_deref(),
                parent: parent.as_deref(),
                date: date.as_deref(),
            };
            run_add(args, &config).await?;
        }
        Commands::Edit {
            id,
            text,
            date,
            clear_date,
        } => {
            let date = if clear_date { Some(None) } else { date.map(Some) };
            run_edit(&id, &text, date, &config).await?;
        }
        Commands::Complete { id } => run_entry_action(EntryAction::Complete, &id, &config).await?,
        Commands::Reopen { id } => run_entry_action(EntryAction::Reopen, &id, &config).await?,
        Commands::Delete { id } => run_entry_action(EntryAction::Delete, &id, &config).await?,
        Commands::Restore { id } => run_entry_action(EntryAction::Restore, &id, &config).await?,
        Commands::Collections { json } => run_collections(json, &config).await?,
        Commands::Collection { command } => match command {
            CollectionCommands::Create {
                name,
                collection_type,
                date,
            } => run_collection_create(&name, collection_type, date, &config).await?,
        },
        Commands::List { collection, json } => {
            run_list(collection.as_deref(), json, &config).await?;
        }
        Commands::Migrate { entries, to } => run_migrate(&entries, &to, &config).await?,
        Commands::Move { entry, from, to } => {
            run_move(&entry, from.as_deref(), &to, &config).await?;
        }
        Commands::Link { entry, collection } => run_link(&entry, &collection, &config).await?,
        Commands::Prefs {
            default_behavior,
            auto_favorite_daily,
            auto_favorite_monthly,
            json,
        } => {
            let input = UpdateUserPreferencesInput {
                default_completed_task_behavior: default_behavior.map(Into::into),
                auto_favorite_recent_daily_logs: auto_favorite_daily,
                auto_favorite_recent_monthly_logs: auto_favorite_monthly,
            };
            run_prefs(input, json, &config).await?;
        }
        Commands::Sync { cursor } => run_sync(cursor, &config).await?,
        Commands::Snapshot => run_snapshot(&config).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
