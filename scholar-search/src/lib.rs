//! # scholar-search
//!
//! arXiv paper search for Daily Scholar.
//!
//! ## Design
//!
//! - Queries the public arXiv export API (Atom), no API key required
//! - Relevance ordering for unbounded searches, newest-first for windowed ones
//! - Over-fetches, then filters by the lookback window client-side
//! - In-memory LRU cache with configurable TTL per client
//!
//! Failures are returned as [`SearchError`]; callers that treat search as
//! best-effort collapse them to an empty result list.

pub mod arxiv;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use arxiv::ArxivClient;
pub use config::SearchConfig;
pub use error::{Result, SearchError};
pub use types::{Paper, SearchRequest, SortOrder};
