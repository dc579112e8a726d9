//! Config resolution and ledger access for CLI commands.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use spotcheck_recon::{SpotCheckConfig, SpotCheckMismatchIgnore};
use spotcheck_store::ReportStore;

use crate::CliError;

pub struct Settings {
    pub config: SpotCheckConfig,
}

impl Settings {
    /// `--config` wins over the default location. A missing default file
    /// means built-in defaults; a missing explicit file is an error.
    pub fn load(config_path: Option<&Path>, db: Option<&Path>) -> Result<Self, CliError> {
        let mut config = match config_path {
            Some(path) => SpotCheckConfig::load(path).map_err(CliError::config)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    SpotCheckConfig::load(&path).map_err(CliError::config)?
                } else {
                    SpotCheckConfig::default()
                }
            }
        };
        if let Some(db) = db {
            config.store.path = db.to_path_buf();
        }
        log::debug!("ledger at {}", config.store.path.display());
        Ok(Self { config })
    }

    pub fn open_store(&self) -> Result<ReportStore, CliError> {
        let path = &self.config.store.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CliError::io(format!("cannot create {}: {e}", parent.display())))?;
        }
        ReportStore::open(path).map_err(|e| {
            CliError::store(e).with_hint(format!("check the ledger path {}", path.display()))
        })
    }

    /// Ignore statuses to hide from listings and summaries.
    pub fn ignored(&self, include_ignored: bool) -> BTreeSet<SpotCheckMismatchIgnore> {
        if include_ignored {
            BTreeSet::new()
        } else {
            self.config.query.ignored_statuses.clone()
        }
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spotcheck")
        .join("spotcheck.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("spotcheck.toml");
        std::fs::write(&config, "[store]\npath = \"from-config.db\"\n").unwrap();

        let settings = Settings::load(Some(config.as_path()), None).unwrap();
        assert_eq!(settings.config.store.path, dir.path().join("from-config.db"));

        let settings = Settings::load(Some(config.as_path()), Some(Path::new("/tmp/other.db"))).unwrap();
        assert_eq!(settings.config.store.path, PathBuf::from("/tmp/other.db"));
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(dir.path().join("missing.toml").as_path()), None).is_err());
    }

    #[test]
    fn include_ignored_clears_hidden_set() {
        let settings = Settings { config: SpotCheckConfig::default() };
        assert_eq!(settings.ignored(false).len(), 3);
        assert!(settings.ignored(true).is_empty());
    }

    #[test]
    fn open_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SpotCheckConfig::default();
        config.store.path = dir.path().join("nested/ledger.db");
        let settings = Settings { config };
        settings.open_store().unwrap();
        assert!(dir.path().join("nested/ledger.db").exists());
    }
}
