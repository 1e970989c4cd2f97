//! User preferences read model

use serde::{Deserialize, Serialize};

use super::{Projection, Reducer};
use crate::models::{DomainEvent, EventPayload, UserPreferences};
use crate::store::USER_PREFERENCES_SNAPSHOT_KEY;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferencesState {
    preferences: UserPreferences,
}

impl Reducer for UserPreferencesState {
    const SNAPSHOT_KEY: &'static str = USER_PREFERENCES_SNAPSHOT_KEY;
    const SNAPSHOT_VERSION: u32 = 1;

    fn apply(&mut self, event: &DomainEvent) -> bool {
        let EventPayload::UserPreferencesUpdated {
            default_completed_task_behavior,
            auto_favorite_recent_daily_logs,
            auto_favorite_recent_monthly_logs,
        } = &event.payload
        else {
            return false;
        };

        let before = self.preferences.clone();
        let preferences = &mut self.preferences;
        if let Some(behavior) = default_completed_task_behavior {
            preferences.default_completed_task_behavior = *behavior;
        }
        if let Some(enabled) = auto_favorite_recent_daily_logs {
            preferences.auto_favorite_recent_daily_logs = *enabled;
        }
        if let Some(enabled) = auto_favorite_recent_monthly_logs {
            preferences.auto_favorite_recent_monthly_logs = *enabled;
        }
        *preferences != before
    }
}

impl Projection<UserPreferencesState> {
    /// Folded preferences, or the defaults before any update.
    pub fn get(&self) -> UserPreferences {
        self.read(|state| state.preferences.clone())
    }
}
