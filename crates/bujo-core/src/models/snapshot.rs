//! Projection snapshot model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serialized projection state plus the last event folded into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionSnapshot {
    /// Snapshot format version of the owning projection
    pub version: u32,
    /// Event the snapshot is current through
    pub last_event_id: String,
    /// Serialized projection contents
    pub state: serde_json::Value,
    /// ISO-8601 save time
    pub saved_at: String,
}

impl ProjectionSnapshot {
    /// True when `self` was saved strictly after `other`.
    ///
    /// Falls back to string comparison when either timestamp fails to parse.
    pub fn is_newer_than(&self, other: &Self) -> bool {
        match (parse_time(&self.saved_at), parse_time(&other.saved_at)) {
            (Some(mine), Some(theirs)) => mine > theirs,
            _ => self.saved_at > other.saved_at,
        }
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(saved_at: &str) -> ProjectionSnapshot {
        ProjectionSnapshot {
            version: 1,
            last_event_id: "e1".to_string(),
            state: serde_json::Value::Null,
            saved_at: saved_at.to_string(),
        }
    }

    #[test]
    fn newer_is_strict() {
        let early = snapshot("2024-01-01T00:00:00.000Z");
        let late = snapshot("2024-01-01T00:00:01.000Z");
        assert!(late.is_newer_than(&early));
        assert!(!early.is_newer_than(&late));
        assert!(!early.is_newer_than(&early.clone()));
    }

    #[test]
    fn compares_across_offsets() {
        let utc = snapshot("2024-01-01T10:00:00.000Z");
        let offset = snapshot("2024-01-01T11:30:00.000+02:00");
        assert!(utc.is_newer_than(&offset));
    }
}
