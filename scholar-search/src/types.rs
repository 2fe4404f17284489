//! Core types for paper search requests and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A research paper returned by the arXiv API.
///
/// Papers are immutable once fetched; `id` is the stable arXiv entry
/// identifier and is used as the deduplication key downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// arXiv entry id, e.g. `http://arxiv.org/abs/2401.01234v1`.
    pub id: String,
    /// Paper title with whitespace collapsed.
    pub title: String,
    /// Author names in publication order.
    pub authors: Vec<String>,
    /// First publication timestamp.
    pub published_date: DateTime<Utc>,
    /// Abstract text with line breaks collapsed to single spaces.
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Direct link to the PDF.
    pub pdf_url: String,
}

/// Result ordering requested from the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Best textual match first. Used for unbounded lookbacks.
    Relevance,
    /// Newest submissions first. Used when a lookback window is set.
    SubmittedDate,
}

impl SortOrder {
    /// Returns the `sortBy` value understood by the arXiv API.
    pub fn as_api_value(&self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::SubmittedDate => "submittedDate",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_value())
    }
}

/// Parameters of a single paper search.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchRequest {
    /// Free-text query passed to the API verbatim.
    pub query: String,
    /// Maximum number of papers to return after date filtering.
    pub max_results: usize,
    /// Lookback window in days. `0` means any time.
    pub days_back: u32,
}

impl SearchRequest {
    /// Create a request.
    pub fn new(query: impl Into<String>, max_results: usize, days_back: u32) -> Self {
        Self {
            query: query.into(),
            max_results,
            days_back,
        }
    }

    /// Sort order used for this request.
    ///
    /// Unbounded searches rank by relevance to surface seminal papers;
    /// windowed searches want the newest submissions.
    pub fn sort_order(&self) -> SortOrder {
        if self.days_back == 0 {
            SortOrder::Relevance
        } else {
            SortOrder::SubmittedDate
        }
    }

    /// Number of entries to request from the API before date filtering.
    ///
    /// Over-fetches so that filtering by date still leaves enough papers.
    pub fn fetch_limit(&self) -> usize {
        if self.days_back == 0 {
            self.max_results.saturating_mul(5)
        } else {
            self.max_results.saturating_mul(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_search_sorts_by_relevance() {
        let req = SearchRequest::new("diffusion", 4, 0);
        assert_eq!(req.sort_order(), SortOrder::Relevance);
        assert_eq!(req.fetch_limit(), 20);
    }

    #[test]
    fn windowed_search_sorts_by_date() {
        let req = SearchRequest::new("diffusion", 4, 7);
        assert_eq!(req.sort_order(), SortOrder::SubmittedDate);
        assert_eq!(req.fetch_limit(), 8);
    }

    #[test]
    fn sort_order_api_values() {
        assert_eq!(SortOrder::Relevance.to_string(), "relevance");
        assert_eq!(SortOrder::SubmittedDate.to_string(), "submittedDate");
    }

    #[test]
    fn paper_serializes_abstract_field_name() {
        let paper = Paper {
            id: "p1".into(),
            title: "T".into(),
            authors: vec!["A".into()],
            published_date: DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_default(),
            abstract_text: "text".into(),
            pdf_url: "https://arxiv.org/pdf/p1".into(),
        };
        let json = serde_json::to_value(&paper).unwrap();
        assert_eq!(json["abstract"], "text");
        assert!(json.get("abstract_text").is_none());
    }
}
