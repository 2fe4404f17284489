//! Centralized application directory paths.
//!
//! Provides a single source of truth for all filesystem paths used by the app.
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! # Directory Layout
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/daily-scholar/` | `~/.local/share/daily-scholar/` |
//! | Config | `~/Library/Application Support/daily-scholar/` | `~/.config/daily-scholar/` |
//! | Cache | `~/Library/Caches/daily-scholar/` | `~/.cache/daily-scholar/` |
//!
//! # Environment Overrides
//!
//! - `SCHOLAR_DATA_DIR`: overrides [`data_dir`]
//! - `SCHOLAR_CONFIG_DIR`: overrides [`config_dir`]
//! - `SCHOLAR_CACHE_DIR`: overrides [`cache_dir`]
//!
//! The `[storage]` config section overrides data and cache roots per
//! deployment; see [`StoragePaths`].

use std::path::{Path, PathBuf};

const APP_DIR: &str = "daily-scholar";

/// Application data root directory.
///
/// Used for durable records: research profile, latest digest, generated
/// images and logs.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("SCHOLAR_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/daily-scholar-data"))
}

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("SCHOLAR_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/daily-scholar-config"))
}

/// Application cache directory.
///
/// Holds the artifact cache. Safe to delete; entries are regenerated.
#[must_use]
pub fn cache_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("SCHOLAR_CACHE_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::cache_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/daily-scholar-cache"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Resolved storage roots for one process.
///
/// Every component receives paths from here instead of consulting the
/// environment itself, so tests can point a whole service graph at a
/// temporary directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    data_dir: PathBuf,
    cache_dir: PathBuf,
}

impl StoragePaths {
    /// Build paths from explicit roots.
    pub fn new(data_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Paths rooted at a single directory (used by tests and portable installs).
    pub fn rooted_at(root: &Path) -> Self {
        Self::new(root.join("data"), root.join("cache"))
    }

    /// Data root.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Artifact cache root (`posters/` and `library/` live below it).
    pub fn artifact_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("artifacts")
    }

    /// Research profile file (`data/user_profile.json`).
    pub fn profile_file(&self) -> PathBuf {
        self.data_dir.join("user_profile.json")
    }

    /// Latest digest record (`data/latest_digest.json`).
    pub fn digest_file(&self) -> PathBuf {
        self.data_dir.join("latest_digest.json")
    }

    /// Digest images and the rendered HTML digest.
    pub fn digests_dir(&self) -> PathBuf {
        self.data_dir.join("daily_digests")
    }

    /// Rendered HTML digest (`data/daily_digests/latest_digest.html`).
    pub fn digest_html_file(&self) -> PathBuf {
        self.digests_dir().join("latest_digest.html")
    }

    /// Standalone poster cover images.
    pub fn posters_dir(&self) -> PathBuf {
        self.data_dir.join("posters")
    }

    /// Log file directory (`data/logs/`).
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(data_dir(), cache_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_is_nonempty() {
        assert!(!data_dir().as_os_str().is_empty());
    }

    #[test]
    fn config_file_is_toml() {
        let path = config_file();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("config.toml")
        );
    }

    #[test]
    fn rooted_paths_stay_under_root() {
        let root = Path::new("/srv/scholar");
        let paths = StoragePaths::rooted_at(root);

        assert!(paths.profile_file().starts_with(root));
        assert!(paths.digest_file().starts_with(root));
        assert!(paths.artifact_cache_dir().starts_with(root));
        assert!(paths.digest_html_file().starts_with(paths.digests_dir()));
    }

    #[test]
    fn cache_and_data_roots_are_distinct() {
        let paths = StoragePaths::rooted_at(Path::new("/srv/scholar"));
        assert!(!paths.artifact_cache_dir().starts_with(paths.data_dir()));
    }
}
