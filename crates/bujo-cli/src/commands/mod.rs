pub mod add;
pub mod collections;
pub mod common;
pub mod completions;
pub mod entry;
pub mod list;
pub mod migrate;
pub mod prefs;
pub mod sync;
