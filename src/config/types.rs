//! Configuration types and structures.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default port for the dashboard API.
pub const DEFAULT_UI_PORT: u16 = 31994;

/// Connection settings for the hosted backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    pub url: String,

    /// Public API key sent with every request.
    #[serde(default)]
    pub anon_key: String,

    /// Signed-in user's token. Falls back to the API key when unset.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Database schema exposed by the REST endpoint (default: public).
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Subscribe to push-channel changes (default: true).
    #[serde(default = "default_realtime")]
    pub realtime: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            access_token: None,
            schema: default_schema(),
            timeout_seconds: default_timeout(),
            realtime: default_realtime(),
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_realtime() -> bool {
    true
}

/// Dashboard API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    /// Port for the dashboard API (default: 31994).
    #[serde(default = "default_ui_port")]
    pub port: u16,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            port: default_ui_port(),
        }
    }
}

fn default_ui_port() -> u16 {
    DEFAULT_UI_PORT
}

/// Parameters of the derived views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewsConfig {
    /// How many days ahead the upcoming view reaches. 0 means unbounded.
    #[serde(default = "default_upcoming_days")]
    pub upcoming_days: u32,

    /// How far back `watch` looks for reminders on startup, in minutes.
    #[serde(default = "default_reminder_lookback")]
    pub reminder_lookback_minutes: i64,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            upcoming_days: default_upcoming_days(),
            reminder_lookback_minutes: default_reminder_lookback(),
        }
    }
}

fn default_upcoming_days() -> u32 {
    14
}

fn default_reminder_lookback() -> i64 {
    15
}

impl ViewsConfig {
    /// Window for [`crate::views::upcoming_tasks`].
    pub fn upcoming_window(&self) -> Option<u32> {
        (self.upcoming_days > 0).then_some(self.upcoming_days)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub ui: UiConfig,

    #[serde(default)]
    pub views: ViewsConfig,
}

impl Config {
    /// Load configuration from a single file, without tier merging.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str("store:\n  url: https://x.supabase.co\n").unwrap();
        assert_eq!(config.store.url, "https://x.supabase.co");
        assert_eq!(config.store.schema, "public");
        assert!(config.store.realtime);
        assert_eq!(config.ui.port, DEFAULT_UI_PORT);
        assert_eq!(config.views.upcoming_window(), Some(14));
    }

    #[test]
    fn test_zero_upcoming_days_is_unbounded() {
        let views = ViewsConfig {
            upcoming_days: 0,
            ..ViewsConfig::default()
        };
        assert_eq!(views.upcoming_window(), None);
    }
}
