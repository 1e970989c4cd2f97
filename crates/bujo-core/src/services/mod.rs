//! Application services shared by every host.

mod journal;

pub use journal::{JournalHandlers, JournalService, RemoteBackend};
