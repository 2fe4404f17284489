//! Shared HTTP client for arXiv API requests.

use crate::config::SearchConfig;
use crate::error::SearchError;
use std::time::Duration;

/// Identifier sent when no custom User-Agent is configured.
const DEFAULT_USER_AGENT: &str = concat!("scholar-search/", env!("CARGO_PKG_VERSION"));

/// Build a [`reqwest::Client`] configured for the arXiv API.
///
/// The client has the configured timeout, a stable User-Agent and
/// gzip decompression. Standard proxy environment variables apply.
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client(config: &SearchConfig) -> Result<reqwest::Client, SearchError> {
    let ua = config
        .user_agent
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned());

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}
