//! bujo-core - Core library for bujo
//!
//! This crate contains the event-sourced journal used by every bujo
//! interface: domain events and models, local and remote stores,
//! projections, command handlers, and the snapshot and sync managers.

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod fractional;
pub mod lifecycle;
pub mod models;
pub mod projection;
pub mod services;
pub mod snapshot_manager;
pub mod state;
pub mod store;
pub mod subscribers;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use services::{JournalHandlers, JournalService, RemoteBackend};
