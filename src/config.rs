//! Configuration types for the digest scheduler, task runner and model client.

use crate::error::{Result, ScholarError};
use crate::scheduler::schedule::MAX_MISFIRE_GRACE_SECS;
use crate::scholar_dirs::{self, StoragePaths};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScholarConfig {
    /// Daily digest schedule and cycle sizing.
    pub digest: DigestConfig,
    /// Progress task runner settings.
    pub runner: RunnerConfig,
    /// Generative model API settings.
    pub model: ModelConfig,
    /// arXiv search settings.
    pub search: SearchSettings,
    /// Storage root overrides.
    pub storage: StorageConfig,
}

/// Daily digest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Local hour of day the digest fires (0-23).
    pub hour: u8,
    /// Minute of hour the digest fires (0-59).
    pub minute: u8,
    /// How late a missed fire may still run, in seconds.
    pub misfire_grace_secs: u64,
    /// Wall-clock polling interval of the scheduler loop, in seconds.
    pub tick_secs: u64,
    /// Run a catch-up cycle at startup when today's digest is missing.
    pub catch_up: bool,
    /// Number of profile queries searched per cycle.
    pub max_queries: usize,
    /// Papers requested per query.
    pub results_per_query: usize,
    /// Search lookback window in days (0 = any time).
    pub days_back: u32,
    /// Papers kept after deduplication.
    pub top_k: usize,
    /// Summaries requested concurrently.
    pub summary_concurrency: usize,
    /// Prefix joined with generated image filenames in the digest record.
    ///
    /// Empty means the bare filename is stored.
    pub asset_base_url: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            hour: 8,
            minute: 0,
            misfire_grace_secs: 3600,
            tick_secs: 30,
            catch_up: true,
            max_queries: 3,
            results_per_query: 2,
            days_back: 30,
            top_k: 5,
            summary_concurrency: 2,
            asset_base_url: "http://127.0.0.1:8000/uploads/daily_digests".to_owned(),
        }
    }
}

impl DigestConfig {
    /// Public reference for a generated image file.
    pub fn asset_url(&self, filename: &str) -> String {
        let base = self.asset_base_url.trim_end_matches('/');
        if base.is_empty() {
            filename.to_owned()
        } else {
            format!("{base}/{filename}")
        }
    }
}

/// Progress task runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Capacity of each run's event channel.
    pub channel_capacity: usize,
    /// Maximum concurrently executing pipelines (0 = unbounded).
    pub max_concurrent_runs: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 32,
            max_concurrent_runs: 4,
        }
    }
}

/// Generative model API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// API key. When empty, read from the `api_key_env` variable.
    pub api_key: String,
    /// Environment variable consulted when `api_key` is empty.
    pub api_key_env: String,
    /// API base URL.
    pub base_url: String,
    /// Model used for summaries and prompts.
    pub text_model: String,
    /// Model used for image generation.
    pub image_model: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Attempts for the PDF upload step.
    pub upload_retries: u32,
    /// Delay between file state polls, in seconds.
    pub upload_poll_secs: u64,
    /// Maximum file state polls before giving up.
    pub upload_poll_attempts: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_key_env: "GOOGLE_API_KEY".to_owned(),
            base_url: "https://generativelanguage.googleapis.com".to_owned(),
            text_model: "gemini-3-flash-preview".to_owned(),
            image_model: "gemini-2.5-flash-image".to_owned(),
            request_timeout_secs: 120,
            upload_retries: 3,
            upload_poll_secs: 2,
            upload_poll_attempts: 60,
        }
    }
}

impl ModelConfig {
    /// Resolve the API key from config or environment.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Config`] when no key is available.
    pub fn resolve_api_key(&self) -> Result<String> {
        if !self.api_key.trim().is_empty() {
            return Ok(self.api_key.trim().to_owned());
        }
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_owned()),
            _ => Err(ScholarError::Config(format!(
                "API key is missing; set model.api_key or the {} environment variable",
                self.api_key_env
            ))),
        }
    }
}

/// arXiv search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// arXiv API endpoint.
    pub base_url: String,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// Result memoization TTL in seconds (0 disables).
    pub cache_ttl_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        let defaults = scholar_search::SearchConfig::default();
        Self {
            base_url: defaults.base_url,
            timeout_secs: defaults.timeout_seconds,
            cache_ttl_secs: defaults.cache_ttl_seconds,
        }
    }
}

impl SearchSettings {
    /// Convert into the search crate's configuration.
    pub fn to_search_config(&self) -> scholar_search::SearchConfig {
        scholar_search::SearchConfig {
            base_url: self.base_url.clone(),
            timeout_seconds: self.timeout_secs,
            cache_ttl_seconds: self.cache_ttl_secs,
            user_agent: None,
        }
    }
}

/// Storage root overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data root (profile, digest, images, logs).
    pub data_dir: Option<PathBuf>,
    /// Cache root (artifact cache).
    pub cache_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve storage paths, falling back to platform directories.
    pub fn resolve(&self) -> StoragePaths {
        StoragePaths::new(
            self.data_dir.clone().unwrap_or_else(scholar_dirs::data_dir),
            self.cache_dir.clone().unwrap_or_else(scholar_dirs::cache_dir),
        )
    }
}

impl ScholarConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ScholarError::Config(e.to_string()))
    }

    /// Load the default config file if present, otherwise defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ScholarError::Config(e.to_string()))?;
        crate::persist::write_bytes_atomic(path, content.as_bytes())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        scholar_dirs::config_file()
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let d = &self.digest;
        if d.hour > 23 {
            return Err(ScholarError::Config("digest.hour must be 0-23".into()));
        }
        if d.minute > 59 {
            return Err(ScholarError::Config("digest.minute must be 0-59".into()));
        }
        if d.misfire_grace_secs > MAX_MISFIRE_GRACE_SECS {
            return Err(ScholarError::Config(format!(
                "digest.misfire_grace_secs must be at most {MAX_MISFIRE_GRACE_SECS}"
            )));
        }
        if d.tick_secs == 0 {
            return Err(ScholarError::Config(
                "digest.tick_secs must be greater than 0".into(),
            ));
        }
        if d.max_queries == 0 || d.results_per_query == 0 || d.top_k == 0 {
            return Err(ScholarError::Config(
                "digest.max_queries, results_per_query and top_k must be greater than 0".into(),
            ));
        }
        if d.summary_concurrency == 0 {
            return Err(ScholarError::Config(
                "digest.summary_concurrency must be greater than 0".into(),
            ));
        }
        if self.runner.channel_capacity == 0 {
            return Err(ScholarError::Config(
                "runner.channel_capacity must be greater than 0".into(),
            ));
        }
        if self.model.upload_retries == 0 {
            return Err(ScholarError::Config(
                "model.upload_retries must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
