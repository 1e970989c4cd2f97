use bujo_core::config::AppConfig;
use bujo_core::sync::{SkipReason, SyncOutcome, SYNC_TIMEOUT_MESSAGE};

use crate::commands::common::open_journal;
use crate::error::CliError;

pub async fn run_sync(cursor: bool, config: &AppConfig) -> Result<(), CliError> {
    if config.remote().is_none() {
        return Err(CliError::SyncNotConfigured);
    }

    let journal = open_journal(config).await?;
    let outcome = if cursor {
        journal.cursor_sync().await.map(SyncOutcome::Completed)
    } else {
        journal.sync_now().await
    };
    journal.shutdown().await;

    match outcome? {
        SyncOutcome::Completed(report) => {
            println!(
                "Sync completed: {} uploaded, {} downloaded",
                report.uploaded, report.downloaded
            );
            Ok(())
        }
        SyncOutcome::Skipped(SkipReason::InFlight) => {
            println!("Sync skipped: another sync is running");
            Ok(())
        }
        SyncOutcome::Skipped(SkipReason::Debounced) => {
            println!("Sync skipped: synced moments ago");
            Ok(())
        }
        SyncOutcome::Failed(message) => Err(CliError::SyncFailed(message)),
        SyncOutcome::TimedOut => Err(CliError::SyncFailed(SYNC_TIMEOUT_MESSAGE.to_string())),
    }
}

pub async fn run_snapshot(config: &AppConfig) -> Result<(), CliError> {
    let journal = open_journal(config).await?;
    let saved = journal.save_snapshots().await;
    journal.shutdown().await;

    println!("Saved {saved} snapshots");
    Ok(())
}
