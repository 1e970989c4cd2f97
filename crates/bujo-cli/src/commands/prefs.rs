use bujo_core::commands::{CommandHandler, UpdateUserPreferencesInput};
use bujo_core::config::AppConfig;
use bujo_core::models::{CompletedTaskBehavior, UserPreferences};

use crate::cli::BehaviorArg;
use crate::commands::common::open_journal;
use crate::error::CliError;

impl From<BehaviorArg> for CompletedTaskBehavior {
    fn from(value: BehaviorArg) -> Self {
        match value {
            BehaviorArg::KeepInPlace => Self::KeepInPlace,
            BehaviorArg::MoveToBottom => Self::MoveToBottom,
            BehaviorArg::Collapse => Self::Collapse,
        }
    }
}

pub async fn run_prefs(
    input: UpdateUserPreferencesInput,
    as_json: bool,
    config: &AppConfig,
) -> Result<(), CliError> {
    let journal = open_journal(config).await?;
    let result = if input == UpdateUserPreferencesInput::default() {
        Ok(())
    } else {
        journal
            .handlers()
            .update_preferences
            .handle(input)
            .await
            .map_err(CliError::from)
    };
    let prefs = journal.preferences().get();
    journal.shutdown().await;
    result?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&prefs)?);
    } else {
        for line in format_prefs_lines(&prefs) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_prefs_lines(prefs: &UserPreferences) -> Vec<String> {
    let behavior = match prefs.default_completed_task_behavior {
        CompletedTaskBehavior::KeepInPlace => "keep-in-place",
        CompletedTaskBehavior::MoveToBottom => "move-to-bottom",
        CompletedTaskBehavior::Collapse => "collapse",
    };
    vec![
        format!("default-behavior: {behavior}"),
        format!("auto-favorite-daily: {}", prefs.auto_favorite_recent_daily_logs),
        format!(
            "auto-favorite-monthly: {}",
            prefs.auto_favorite_recent_monthly_logs
        ),
    ]
}
