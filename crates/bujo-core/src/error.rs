//! Error types for bujo-core

use thiserror::Error;

/// Result type alias using bujo-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bujo-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local persistence medium rejected a read or write
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Remote call failed
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote call exceeded its bounded wait
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A command was rejected against current projection state
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Local persistence failures, including an uninitialized store.
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Database(_) | Self::Io(_))
    }

    /// Remote transport failures.
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Http(_))
    }

    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
