//! Configuration loader with tier-based merging.

use super::merge::deep_merge_all;
use super::types::Config;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Explicit config file; replaces the file tiers.
pub const ENV_CONFIG_PATH: &str = "TASKBOARD_CONFIG_PATH";
pub const ENV_STORE_URL: &str = "TASKBOARD_STORE_URL";
pub const ENV_STORE_KEY: &str = "TASKBOARD_STORE_KEY";
pub const ENV_ACCESS_TOKEN: &str = "TASKBOARD_ACCESS_TOKEN";
pub const ENV_SCHEMA: &str = "TASKBOARD_SCHEMA";
pub const ENV_UI_PORT: &str = "TASKBOARD_UI_PORT";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    /// `./taskboard/config.yaml`
    Project = 1,
    /// `~/.taskboard/config.yaml`
    User = 2,
    /// A file named on the command line or in `TASKBOARD_CONFIG_PATH`.
    Explicit = 3,
    Environment = 4,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Explicit => write!(f, "explicit"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Where each tier is read from.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
    /// When set, the project and user tiers are skipped.
    pub explicit_file: Option<PathBuf>,
}

impl ConfigPaths {
    /// Standard locations: `./taskboard` and `~/.taskboard`.
    pub fn discover() -> Self {
        Self {
            project_dir: Some(PathBuf::from("taskboard")),
            user_dir: dirs::home_dir().map(|home| home.join(".taskboard")),
            explicit_file: None,
        }
    }

    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
            explicit_file: None,
        }
    }

    pub fn with_explicit_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_file = Some(path.into());
        self
    }
}

/// Loads and merges every configuration tier.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Tiers that contributed, in merge order.
    sources: Vec<(ConfigTier, Option<PathBuf>)>,
}

impl ConfigLoader {
    /// Load from the standard locations and the process environment.
    pub fn load() -> Result<Self> {
        Self::load_with_paths(ConfigPaths::discover())
    }

    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        Self::load_with_env(paths, |key| std::env::var(key).ok())
    }

    /// Load with an explicit environment lookup.
    pub fn load_with_env(
        mut paths: ConfigPaths,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        if paths.explicit_file.is_none() {
            paths.explicit_file = env(ENV_CONFIG_PATH).map(PathBuf::from);
        }

        let mut tiers: Vec<Value> = Vec::new();
        let mut sources = Vec::new();

        tiers.push(serde_json::to_value(Config::default())?);
        sources.push((ConfigTier::Defaults, None));

        if let Some(ref explicit) = paths.explicit_file {
            // A named file must exist and parse.
            let value = read_yaml(explicit)?
                .with_context(|| format!("Config file {} not found", explicit.display()))?;
            tiers.push(value);
            sources.push((ConfigTier::Explicit, Some(explicit.clone())));
        } else {
            for (tier, dir) in [
                (ConfigTier::Project, paths.project_dir.as_deref()),
                (ConfigTier::User, paths.user_dir.as_deref()),
            ] {
                let Some(dir) = dir else { continue };
                let file = dir.join("config.yaml");
                match read_yaml(&file) {
                    Ok(Some(value)) => {
                        tiers.push(value);
                        sources.push((tier, Some(file)));
                    }
                    Ok(None) => {}
                    Err(err) => warn!(tier = %tier, error = %err, "Skipping unreadable config file"),
                }
            }
        }

        let merged = deep_merge_all(tiers);
        let mut config: Config =
            serde_json::from_value(merged).context("Invalid configuration")?;

        if Self::apply_env_overrides(&mut config, &env)? {
            sources.push((ConfigTier::Environment, None));
        }

        debug!(
            tiers = ?sources.iter().map(|(t, _)| t.to_string()).collect::<Vec<_>>(),
            "Configuration loaded"
        );
        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    /// Returns whether any override was present.
    fn apply_env_overrides(
        config: &mut Config,
        env: &impl Fn(&str) -> Option<String>,
    ) -> Result<bool> {
        let mut applied = false;

        if let Some(url) = env(ENV_STORE_URL) {
            config.store.url = url;
            applied = true;
        }
        if let Some(key) = env(ENV_STORE_KEY) {
            config.store.anon_key = key;
            applied = true;
        }
        if let Some(token) = env(ENV_ACCESS_TOKEN) {
            config.store.access_token = Some(token).filter(|t| !t.is_empty());
            applied = true;
        }
        if let Some(schema) = env(ENV_SCHEMA) {
            config.store.schema = schema;
            applied = true;
        }
        if let Some(port) = env(ENV_UI_PORT) {
            config.ui.port = port
                .parse()
                .with_context(|| format!("{} must be a port number, got '{}'", ENV_UI_PORT, port))?;
            applied = true;
        }

        Ok(applied)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Tiers that contributed to the loaded configuration.
    pub fn sources(&self) -> &[(ConfigTier, Option<PathBuf>)] {
        &self.sources
    }

    /// The highest-priority file that was read, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.sources
            .iter()
            .rev()
            .find_map(|(_, path)| path.as_deref())
    }
}

/// `Ok(None)` when the file does not exist.
fn read_yaml(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Invalid YAML in {}", path.display()))?;
    Ok(Some(value))
}
