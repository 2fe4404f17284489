//! Search configuration with sensible defaults.
//!
//! [`SearchConfig`] controls the API endpoint, timeouts and result
//! memoization. The defaults follow arXiv's published API etiquette.

use crate::error::SearchError;

/// Default arXiv export API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://export.arxiv.org/api/query";

/// Configuration for the arXiv client.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Query endpoint. Overridden in tests to point at a mock server.
    pub base_url: String,
    /// HTTP request timeout in seconds.
    pub timeout_seconds: u64,
    /// How long to memoize results in seconds. Set to 0 to disable caching.
    pub cache_ttl_seconds: u64,
    /// Custom User-Agent string. If `None`, a crate identifier is sent.
    pub user_agent: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout_seconds: 30,
            cache_ttl_seconds: 3600,
            user_agent: None,
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `timeout_seconds` must be greater than 0
    /// - `base_url` must be an absolute http(s) URL
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        let parsed = url::Url::parse(&self.base_url)
            .map_err(|e| SearchError::Config(format!("invalid base_url: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SearchError::Config(
                "base_url must use http or https".into(),
            ));
        }
        Ok(())
    }
}
