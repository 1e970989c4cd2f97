//! Local database layer for bujo

mod connection;
mod migrations;
mod settings_repository;

pub use connection::Database;
pub use settings_repository::LocalSettings;
