//! Application configuration.
//!
//! `AppConfig` is built once by the host (CLI or app shell) and handed to
//! the stores and managers it wires together. Nothing reads it globally.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const ENV_REMOTE_URL: &str = "BUJO_REMOTE_URL";
pub const ENV_USER_ID: &str = "BUJO_USER_ID";
pub const ENV_AUTH_TOKEN: &str = "BUJO_AUTH_TOKEN";
pub const ENV_DB_PATH: &str = "BUJO_DB_PATH";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Local SQLite file; the host picks a default when absent
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Remote document store; absent means offline-only
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub snapshots: SnapshotSettings,
}

/// Where remote documents live and who they belong to.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    pub base_url: String,
    pub user_id: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Sync timing knobs, all in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct SyncSettings {
    /// Periodic sync interval
    pub interval_secs: u64,
    /// Minimum gap between the end of one sync and the start of the next
    pub debounce_secs: u64,
    /// Upper bound on one reconciliation pass
    pub timeout_secs: u64,
    /// Upper bound on the cold-start remote snapshot fetch
    pub snapshot_fetch_timeout_secs: u64,
    /// Events per upload batch in cursor sync
    pub cursor_batch_size: usize,
    /// Run interval and lifecycle-driven syncs; off for one-shot hosts
    pub background: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            debounce_secs: 5,
            timeout_secs: 15,
            snapshot_fetch_timeout_secs: 5,
            cursor_batch_size: 500,
            background: true,
        }
    }
}

impl SyncSettings {
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub const fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_secs)
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub const fn snapshot_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.snapshot_fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct SnapshotSettings {
    /// Appended events between count-triggered snapshots
    pub event_threshold: usize,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            event_threshold: 50,
        }
    }
}

impl AppConfig {
    /// Read a JSON config file. A missing file yields the defaults.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|error| Error::InvalidInput(format!("invalid config: {error}")))
    }

    /// Overlay `BUJO_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Overlay values from `lookup`; blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| normalize_text_option(lookup(key));

        if let Some(path) = get(ENV_DB_PATH) {
            self.database_path = Some(PathBuf::from(path));
        }

        let url = get(ENV_REMOTE_URL);
        let user_id = get(ENV_USER_ID);
        let token = get(ENV_AUTH_TOKEN);
        if let Some(remote) = self.remote.as_mut() {
            if let Some(url) = url {
                remote.base_url = url;
            }
            if let Some(user_id) = user_id {
                remote.user_id = user_id;
            }
            if token.is_some() {
                remote.auth_token = token;
            }
            return;
        }

        match (url, user_id) {
            (Some(base_url), Some(user_id)) => {
                self.remote = Some(RemoteConfig {
                    base_url,
                    user_id,
                    auth_token: token,
                });
            }
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(
                    "{ENV_REMOTE_URL} and {ENV_USER_ID} must be set together; staying offline"
                );
            }
            (None, None) => {}
        }
    }

    /// Reject values that would only fail later at runtime.
    pub fn validate(&self) -> Result<()> {
        if let Some(remote) = &self.remote {
            let url = remote.base_url.trim();
            if !is_http_url(url) {
                return Err(Error::InvalidInput(format!(
                    "remote.base_url must include http:// or https://: {url}"
                )));
            }
            if remote.user_id.trim().is_empty() {
                return Err(Error::InvalidInput("remote.user_id must not be empty".to_string()));
            }
        }
        if self.snapshots.event_threshold == 0 {
            return Err(Error::InvalidInput(
                "snapshots.event_threshold must be at least 1".to_string(),
            ));
        }
        if self.sync.cursor_batch_size == 0 {
            return Err(Error::InvalidInput(
                "sync.cursor_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Remote settings with the base URL's trailing slash trimmed.
    pub fn remote(&self) -> Option<RemoteConfig> {
        self.remote.clone().map(|mut remote| {
            remote.base_url = remote.base_url.trim().trim_end_matches('/').to_string();
            remote
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from_path(dir.path().join("config.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.sync.interval(), Duration::from_secs(300));
        assert_eq!(config.snapshots.event_threshold, 50);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::parse(r#"{ "sync": { "timeout_secs": 30 } }"#).unwrap();
        assert_eq!(config.sync.timeout_secs, 30);
        assert_eq!(config.sync.debounce_secs, 5);
        assert!(config.remote.is_none());
    }

    #[test]
    fn rejects_unknown_fields() {
        let error = AppConfig::parse(r#"{ "sinc": {} }"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn env_overrides_build_remote() {
        let mut config = AppConfig::default();
        config.apply_overrides(lookup(&[
            (ENV_REMOTE_URL, "https://journal.example.com/"),
            (ENV_USER_ID, "u1"),
            (ENV_AUTH_TOKEN, "secret"),
            (ENV_DB_PATH, "/tmp/bujo.db"),
        ]));

        let remote = config.remote().unwrap();
        assert_eq!(remote.base_url, "https://journal.example.com");
        assert_eq!(remote.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/bujo.db")));
        assert!(!format!("{remote:?}").contains("secret"));
    }

    #[test]
    fn env_url_without_user_stays_offline() {
        let mut config = AppConfig::default();
        config.apply_overrides(lookup(&[(ENV_REMOTE_URL, "https://journal.example.com")]));
        assert!(config.remote.is_none());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.remote = Some(RemoteConfig {
            base_url: "journal.example.com".to_string(),
            user_id: "u1".to_string(),
            auth_token: None,
        });
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.snapshots.event_threshold = 0;
        assert!(config.validate().is_err());

        assert!(AppConfig::default().validate().is_ok());
    }
}
