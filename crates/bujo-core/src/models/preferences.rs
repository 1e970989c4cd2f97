//! User preferences model

use serde::{Deserialize, Serialize};

use super::CompletedTaskBehavior;

/// Singleton preferences, folded from `UserPreferencesUpdated` events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub default_completed_task_behavior: CompletedTaskBehavior,
    /// Favorite yesterday's, today's and tomorrow's daily logs automatically
    pub auto_favorite_recent_daily_logs: bool,
    /// Favorite the current month's log automatically
    pub auto_favorite_recent_monthly_logs: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_completed_tasks_in_place() {
        let prefs = UserPreferences::default();
        assert_eq!(
            prefs.default_completed_task_behavior,
            CompletedTaskBehavior::KeepInPlace
        );
        assert!(!prefs.auto_favorite_recent_daily_logs);
        assert!(!prefs.auto_favorite_recent_monthly_logs);
    }
}
