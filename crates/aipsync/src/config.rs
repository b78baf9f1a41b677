use std::path::{Path, PathBuf};

use aipsync_core::SyncConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Contents of `aipsync.toml`.
///
/// ```toml
/// catalog = "catalog.json"
/// publish_root = "/srv/mirror"
///
/// [sync]
/// local_root = "aip"
/// workers = 5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog:              PathBuf,
    /// Mirror directory for merged artifacts; publishing is off when unset.
    pub publish_root:         Option<PathBuf>,
    pub connect_timeout_secs: u64,
    pub sync:                 SyncConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog:              PathBuf::from("catalog.json"),
            publish_root:         None,
            connect_timeout_secs: 30,
            sync:                 SyncConfig::default(),
        }
    }
}

impl Config {
    /// Read the file at `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.sync.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("aipsync.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::parse(
            r#"
            publish_root = "/srv/mirror"

            [sync]
            workers = 8
            country = "KR"
            "#,
        )
        .unwrap();

        assert_eq!(config.catalog, PathBuf::from("catalog.json"));
        assert_eq!(config.publish_root, Some(PathBuf::from("/srv/mirror")));
        assert_eq!(config.sync.workers, 8);
        assert_eq!(config.sync.country, "KR");
        assert_eq!(config.sync.retry_ceiling, SyncConfig::default().retry_ceiling);
    }

    #[test]
    fn test_invalid_sync_section_is_rejected() {
        let err = Config::parse("[sync]\nworkers = 0\n").unwrap_err();
        assert!(format!("{err:#}").contains("workers"));
    }
}
