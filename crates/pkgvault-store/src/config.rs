use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Settings for opening a [`crate::BlobStorage`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory of the store.
    pub root: PathBuf,
    /// `fsync` each staged file before it is renamed into place.
    pub sync_on_commit: bool,
    /// When set, `open` deletes staging files older than this many seconds.
    pub stale_staging_after_secs: Option<u64>,
}

impl StoreConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn stale_staging_after(&self) -> Option<Duration> {
        self.stale_staging_after_secs.map(Duration::from_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("blobs"),
            sync_on_commit: true,
            stale_staging_after_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.root, PathBuf::from("blobs"));
        assert!(c.sync_on_commit);
        assert!(c.stale_staging_after().is_none());
    }

    #[test]
    fn parse_full_toml() {
        let c = StoreConfig::from_toml_str(
            r#"
            root = "/var/lib/pkgvault/blobs"
            sync_on_commit = false
            stale_staging_after_secs = 3600
            "#,
        )
        .unwrap();
        assert_eq!(c.root, PathBuf::from("/var/lib/pkgvault/blobs"));
        assert!(!c.sync_on_commit);
        assert_eq!(c.stale_staging_after(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let c = StoreConfig::from_toml_str(r#"root = "/srv/blobs""#).unwrap();
        assert!(c.sync_on_commit);
        assert!(c.stale_staging_after_secs.is_none());
    }

    #[test]
    fn bad_toml_is_config_error() {
        let err = StoreConfig::from_toml_str("root = 42").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let err = StoreConfig::load(Path::new("/nonexistent/pkgvault.toml")).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }
}
