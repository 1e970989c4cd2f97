//! User preference commands

use std::sync::Arc;

use async_trait::async_trait;

use super::CommandHandler;
use crate::error::{Error, Result};
use crate::models::{CompletedTaskBehavior, DomainEvent, EventPayload};
use crate::projection::UserPreferencesProjection;
use crate::store::EventStore;

/// Partial update; `None` leaves a preference unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateUserPreferencesInput {
    pub default_completed_task_behavior: Option<CompletedTaskBehavior>,
    pub auto_favorite_recent_daily_logs: Option<bool>,
    pub auto_favorite_recent_monthly_logs: Option<bool>,
}

impl UpdateUserPreferencesInput {
    fn is_empty(&self) -> bool {
        self.default_completed_task_behavior.is_none()
            && self.auto_favorite_recent_daily_logs.is_none()
            && self.auto_favorite_recent_monthly_logs.is_none()
    }
}

pub struct UpdateUserPreferencesHandler {
    events: Arc<dyn EventStore>,
    preferences: Arc<UserPreferencesProjection>,
}

impl UpdateUserPreferencesHandler {
    pub fn new(events: Arc<dyn EventStore>, preferences: Arc<UserPreferencesProjection>) -> Self {
        Self {
            events,
            preferences,
        }
    }
}

#[async_trait]
impl CommandHandler for UpdateUserPreferencesHandler {
    type Input = UpdateUserPreferencesInput;

    async fn handle(&self, input: Self::Input) -> Result<()> {
        if input.is_empty() {
            return Err(Error::Validation(
                "at least one preference must be given".to_string(),
            ));
        }

        let current = self.preferences.get();
        let mut next = current.clone();
        if let Some(behavior) = input.default_completed_task_behavior {
            next.default_completed_task_behavior = behavior;
        }
        if let Some(enabled) = input.auto_favorite_recent_daily_logs {
            next.auto_favorite_recent_daily_logs = enabled;
        }
        if let Some(enabled) = input.auto_favorite_recent_monthly_logs {
            next.auto_favorite_recent_monthly_logs = enabled;
        }
        if next == current {
            tracing::debug!("Preferences unchanged, nothing to append");
            return Ok(());
        }

        self.events
            .append(&DomainEvent::new(EventPayload::UserPreferencesUpdated {
                default_completed_task_behavior: input.default_completed_task_behavior,
                auto_favorite_recent_daily_logs: input.auto_favorite_recent_daily_logs,
                auto_favorite_recent_monthly_logs: input.auto_favorite_recent_monthly_logs,
            }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::Fixture;

    fn handler(fixture: &Fixture) -> UpdateUserPreferencesHandler {
        UpdateUserPreferencesHandler::new(fixture.store(), fixture.preferences.clone())
    }

    #[tokio::test]
    async fn empty_update_is_rejected() {
        let fixture = Fixture::new();
        let error = handler(&fixture)
            .handle(UpdateUserPreferencesInput::default())
            .await
            .unwrap_err();
        assert!(error.is_validation());
    }

    #[tokio::test]
    async fn partial_update_keeps_other_values() {
        let fixture = Fixture::new();
        handler(&fixture)
            .handle(UpdateUserPreferencesInput {
                default_completed_task_behavior: Some(CompletedTaskBehavior::MoveToBottom),
                ..Default::default()
            })
            .await
            .unwrap();
        handler(&fixture)
            .handle(UpdateUserPreferencesInput {
                auto_favorite_recent_daily_logs: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();

        let preferences = fixture.preferences.get();
        assert_eq!(
            preferences.default_completed_task_behavior,
            CompletedTaskBehavior::MoveToBottom
        );
        assert!(preferences.auto_favorite_recent_daily_logs);

        // Same values again: no new event.
        handler(&fixture)
            .handle(UpdateUserPreferencesInput {
                auto_favorite_recent_daily_logs: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(fixture.event_count().await, 2);
    }
}
