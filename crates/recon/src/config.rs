use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ReconError;
use crate::model::SpotCheckMismatchIgnore;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpotCheckConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file. Relative paths resolve against the config file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("spotcheck.db")
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Ignore statuses hidden from listings and summaries unless asked for.
    #[serde(default = "default_ignored")]
    pub ignored_statuses: BTreeSet<SpotCheckMismatchIgnore>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            ignored_statuses: default_ignored(),
        }
    }
}

fn default_limit() -> usize {
    50
}

fn default_ignored() -> BTreeSet<SpotCheckMismatchIgnore> {
    BTreeSet::from([
        SpotCheckMismatchIgnore::IgnoreOnce,
        SpotCheckMismatchIgnore::IgnorePermanently,
        SpotCheckMismatchIgnore::IgnoreUntilResolved,
    ])
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl SpotCheckConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: SpotCheckConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`; relative store paths are resolved against its directory.
    pub fn load(path: &Path) -> Result<Self, ReconError> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| ReconError::Io(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_toml(&input)?;
        if config.store.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.store.path = dir.join(&config.store.path);
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.store.path.as_os_str().is_empty() {
            return Err(ReconError::ConfigValidation("store.path must not be empty".into()));
        }
        if self.query.default_limit == 0 {
            return Err(ReconError::ConfigValidation(
                "query.default_limit must be greater than 0".into(),
            ));
        }
        if self.query.ignored_statuses.contains(&SpotCheckMismatchIgnore::NotIgnored) {
            return Err(ReconError::ConfigValidation(
                "query.ignored_statuses must not hide NOT_IGNORED rows".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
