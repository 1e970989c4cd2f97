use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "bujo")]
#[command(about = "An offline-first bullet journal for the terminal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a task, note or event
    #[command(alias = "new")]
    Add {
        /// Kind of entry
        #[arg(value_enum)]
        kind: EntryKindArg,
        /// Entry text
        text: Vec<String>,
        /// Collection ID, unique ID prefix or name
        #[arg(short, long, value_name = "COLLECTION")]
        collection: Option<String>,
        /// Parent entry ID or unique ID prefix
        #[arg(short, long, value_name = "ENTRY")]
        parent: Option<String>,
        /// Event date (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
    },
    /// Change an entry's text or event date
    Edit {
        /// Entry ID or unique ID prefix
        id: String,
        /// New text (unchanged when omitted)
        text: Vec<String>,
        /// New event date (YYYY-MM-DD)
        #[arg(long, value_name = "DATE", conflicts_with = "clear_date")]
        date: Option<String>,
        /// Remove the event date
        #[arg(long)]
        clear_date: bool,
    },
    /// Mark a task completed
    Complete {
        /// Entry ID or unique ID prefix
        id: String,
    },
    /// Reopen a completed task
    Reopen {
        /// Entry ID or unique ID prefix
        id: String,
    },
    /// Delete an entry
    Delete {
        /// Entry ID or unique ID prefix
        id: String,
    },
    /// Restore a deleted entry
    Restore {
        /// Entry ID or unique ID prefix
        id: String,
    },
    /// List collections
    Collections {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage collections
    Collection {
        #[command(subcommand)]
        command: CollectionCommands,
    },
    /// List entries in a collection (uncategorized when omitted)
    List {
        /// Collection ID, unique ID prefix or name
        collection: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Migrate entries into another collection
    Migrate {
        /// Entry IDs or unique ID prefixes
        #[arg(required = true)]
        entries: Vec<String>,
        /// Target collection
        #[arg(long, value_name = "COLLECTION")]
        to: String,
    },
    /// Move an entry between collections, leaving a ghost behind
    Move {
        /// Entry ID or unique ID prefix
        entry: String,
        /// Collection to leave (first membership when omitted)
        #[arg(long, value_name = "COLLECTION")]
        from: Option<String>,
        /// Collection to join
        #[arg(long, value_name = "COLLECTION")]
        to: String,
    },
    /// Add an entry to another collection
    Link {
        /// Entry ID or unique ID prefix
        entry: String,
        /// Collection ID, unique ID prefix or name
        collection: String,
    },
    /// Show or update preferences
    Prefs {
        /// Default completed-task behavior
        #[arg(long, value_enum, value_name = "BEHAVIOR")]
        default_behavior: Option<BehaviorArg>,
        /// Auto-favorite yesterday's, today's and tomorrow's daily logs
        #[arg(long, value_name = "BOOL")]
        auto_favorite_daily: Option<bool>,
        /// Auto-favorite the current monthly log
        #[arg(long, value_name = "BOOL")]
        auto_favorite_monthly: Option<bool>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sync the local event log with the remote
    Sync {
        /// Use the timestamp-cursor bulk strategy
        #[arg(long)]
        cursor: bool,
    },
    /// Save projection snapshots now
    Snapshot,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum CollectionCommands {
    /// Create a collection
    Create {
        /// Collection name
        name: Vec<String>,
        /// Collection type
        #[arg(long = "type", value_enum, default_value_t = CollectionTypeArg::Custom)]
        collection_type: CollectionTypeArg,
        /// Date for daily (YYYY-MM-DD) and monthly (YYYY-MM) logs
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum EntryKindArg {
    Task,
    Note,
    Event,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CollectionTypeArg {
    Daily,
    Monthly,
    Custom,
    Log,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum BehaviorArg {
    KeepInPlace,
    MoveToBottom,
    Collapse,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
    Elvish,
}
