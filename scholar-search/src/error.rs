//! Error types for the scholar-search crate.
//!
//! All errors use stable string messages suitable for logs. Search
//! failures never carry raw response bodies.

/// Errors that can occur while querying arXiv.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The HTTP request to the arXiv API failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The Atom response could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid search configuration or request.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias for scholar-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
