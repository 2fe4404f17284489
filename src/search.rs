//! Paper search collaborator.

use crate::config::SearchSettings;
use crate::error::Result;
use async_trait::async_trait;
use scholar_search::{ArxivClient, SearchRequest};

pub use scholar_search::Paper;

/// Search used by the digest engine.
///
/// Never fails: transport and parse errors collapse to an empty list, so
/// callers cannot tell "no results" from "search error".
#[async_trait]
pub trait PaperSearch: Send + Sync {
    /// Up to `max_results` papers for `query`, published within `days_back`
    /// days (`0` = no window), in relevance/recency order.
    async fn search(&self, query: &str, max_results: usize, days_back: u32) -> Vec<Paper>;
}

/// [`PaperSearch`] backed by the arXiv export API.
#[derive(Clone)]
pub struct ArxivSearch {
    client: ArxivClient,
}

impl ArxivSearch {
    /// Build from search settings.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ScholarError::Search`] for invalid settings.
    pub fn new(settings: &SearchSettings) -> Result<Self> {
        let client = ArxivClient::new(settings.to_search_config())?;
        Ok(Self { client })
    }

    /// Search, surfacing errors (used by the CLI `search` command).
    ///
    /// # Errors
    ///
    /// Returns [`crate::ScholarError::Search`] on transport or parse failures.
    pub async fn try_search(
        &self,
        query: &str,
        max_results: usize,
        days_back: u32,
    ) -> Result<Vec<Paper>> {
        let request = SearchRequest::new(query, max_results, days_back);
        Ok(self.client.search(&request).await?)
    }
}

#[async_trait]
impl PaperSearch for ArxivSearch {
    async fn search(&self, query: &str, max_results: usize, days_back: u32) -> Vec<Paper> {
        match self.try_search(query, max_results, days_back).await {
            Ok(papers) => papers,
            Err(e) => {
                tracing::warn!(query, "search failed, treating as no results: {e}");
                Vec::new()
            }
        }
    }
}
