use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] bujo_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No entry text provided")]
    EmptyContent,
    #[error("ID cannot be empty")]
    EmptyIdentifier,
    #[error("Entry not found for id/prefix: {0}")]
    EntryNotFound(String),
    #[error("Collection not found for id/prefix/name: {0}")]
    CollectionNotFound(String),
    #[error("{0}")]
    AmbiguousIdentifier(String),
    #[error("Sync failed: {0}")]
    SyncFailed(String),
    #[error(
        "Sync is not configured. Set BUJO_REMOTE_URL and BUJO_USER_ID, or add a `remote` section to the config file."
    )]
    SyncNotConfigured,
}
