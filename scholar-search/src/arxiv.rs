//! arXiv export API client.
//!
//! Builds `search_query` requests against the Atom endpoint, parses the
//! feed with [`feed_rs`], filters by the lookback window and memoizes
//! final result lists per request.

use chrono::{DateTime, Duration, Utc};
use feed_rs::model::Entry;
use url::Url;

use crate::cache::{CacheKey, SearchCache};
use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::http;
use crate::types::{Paper, SearchRequest};

/// Async client for the arXiv API.
///
/// Cheap to clone: the HTTP client and the result cache are shared
/// between clones.
#[derive(Clone)]
pub struct ArxivClient {
    config: SearchConfig,
    client: reqwest::Client,
    cache: SearchCache,
}

impl ArxivClient {
    /// Create a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for an invalid configuration or
    /// [`SearchError::Http`] if the HTTP client cannot be built.
    pub fn new(config: SearchConfig) -> Result<Self> {
        config.validate()?;
        let client = http::build_client(&config)?;
        let cache = SearchCache::new(config.cache_ttl_seconds);
        Ok(Self {
            config,
            client,
            cache,
        })
    }

    /// Search arXiv for papers matching `request`.
    ///
    /// When `days_back > 0`, entries published before the cutoff are
    /// skipped. At most `max_results` papers are returned, in API order.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] on transport or status failures and
    /// [`SearchError::Parse`] when the feed is malformed.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<Paper>> {
        if request.query.trim().is_empty() {
            return Err(SearchError::Config("query must not be empty".into()));
        }
        if request.max_results == 0 {
            return Ok(Vec::new());
        }

        let key = CacheKey::new(request);
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(query = %request.query, count = hit.len(), "arXiv cache hit");
            return Ok(hit);
        }

        let url = build_query_url(&self.config.base_url, request)?;
        tracing::debug!(
            query = %request.query,
            days_back = request.days_back,
            sort = %request.sort_order(),
            limit = request.fetch_limit(),
            "arXiv search"
        );

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SearchError::Http(format!("arXiv request failed: {e}")))?
            .error_for_status()
            .map_err(|e| SearchError::Http(format!("arXiv HTTP error: {e}")))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SearchError::Http(format!("arXiv response read failed: {e}")))?;

        let cutoff = lookback_cutoff(request.days_back, Utc::now());
        let papers = parse_feed(&bytes, cutoff, request.max_results)?;
        tracing::debug!(query = %request.query, count = papers.len(), "arXiv search complete");

        self.cache.insert(key, papers.clone()).await;
        Ok(papers)
    }
}

/// Build the API URL for a request.
///
/// # Errors
///
/// Returns [`SearchError::Config`] if `base_url` is not a valid URL.
pub fn build_query_url(base_url: &str, request: &SearchRequest) -> Result<Url> {
    let mut url =
        Url::parse(base_url).map_err(|e| SearchError::Config(format!("invalid base_url: {e}")))?;
    url.query_pairs_mut()
        .append_pair("search_query", request.query.trim())
        .append_pair("start", "0")
        .append_pair("max_results", &request.fetch_limit().to_string())
        .append_pair("sortBy", request.sort_order().as_api_value())
        .append_pair("sortOrder", "descending");
    Ok(url)
}

/// Earliest publication time accepted for a lookback window.
pub fn lookback_cutoff(days_back: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    (days_back > 0).then(|| now - Duration::days(i64::from(days_back)))
}

/// Parse an arXiv Atom feed into papers.
///
/// Extracted as a separate function for testability with fixture XML.
pub(crate) fn parse_feed(
    bytes: &[u8],
    cutoff: Option<DateTime<Utc>>,
    max_results: usize,
) -> Result<Vec<Paper>> {
    let feed = feed_rs::parser::parse(bytes)
        .map_err(|e| SearchError::Parse(format!("invalid Atom feed: {e}")))?;

    let mut papers = Vec::new();
    for entry in feed.entries {
        let Some(paper) = entry_to_paper(entry) else {
            continue;
        };
        if let Some(cutoff) = cutoff {
            if paper.published_date < cutoff {
                continue;
            }
        }
        papers.push(paper);
        if papers.len() >= max_results {
            break;
        }
    }
    Ok(papers)
}

fn entry_to_paper(entry: Entry) -> Option<Paper> {
    let published_date = entry.published.or(entry.updated)?;
    let title = collapse_whitespace(&entry.title.map(|t| t.content).unwrap_or_default());
    if entry.id.is_empty() || title.is_empty() {
        return None;
    }

    let pdf_url = entry
        .links
        .iter()
        .find(|link| {
            link.media_type.as_deref() == Some("application/pdf")
                || link.title.as_deref() == Some("pdf")
        })
        .map(|link| link.href.clone())
        .unwrap_or_else(|| entry.id.replacen("/abs/", "/pdf/", 1));

    Some(Paper {
        title,
        authors: entry.authors.into_iter().map(|p| p.name).collect(),
        published_date,
        abstract_text: collapse_whitespace(
            &entry.summary.map(|s| s.content).unwrap_or_default(),
        ),
        pdf_url,
        id: entry.id,
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn feed(entries: &[(&str, &str, &str)]) -> String {
        let mut body = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>http://arxiv.org/api/query</id>
  <title>arXiv Query</title>
  <updated>2026-10-17T00:00:00Z</updated>
"#,
        );
        for (id, title, published) in entries {
            body.push_str(&format!(
                r#"  <entry>
    <id>http://arxiv.org/abs/{id}</id>
    <updated>{published}</updated>
    <published>{published}</published>
    <title>{title}
      continued</title>
    <summary>  First line of the abstract.
  Second line.</summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <link href="http://arxiv.org/abs/{id}" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/{id}" rel="related" type="application/pdf"/>
  </entry>
"#
            ));
        }
        body.push_str("</feed>\n");
        body
    }

    #[test]
    fn parse_feed_extracts_fields() {
        let xml = feed(&[("2410.00001v1", "Retrieval Augmented", "2026-10-10T12:00:00Z")]);
        let papers = parse_feed(xml.as_bytes(), None, 10).unwrap();

        assert_eq!(papers.len(), 1);
        let paper = &papers[0];
        assert_eq!(paper.id, "http://arxiv.org/abs/2410.00001v1");
        assert_eq!(paper.title, "Retrieval Augmented continued");
        assert_eq!(paper.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(
            paper.abstract_text,
            "First line of the abstract. Second line."
        );
        assert_eq!(paper.pdf_url, "http://arxiv.org/pdf/2410.00001v1");
    }

    #[test]
    fn parse_feed_filters_by_cutoff() {
        let xml = feed(&[
            ("new", "Fresh", "2026-10-15T00:00:00Z"),
            ("old", "Stale", "2026-01-01T00:00:00Z"),
        ]);
        let cutoff = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).single();
        let papers = parse_feed(xml.as_bytes(), cutoff, 10).unwrap();

        assert_eq!(papers.len(), 1);
        assert!(papers[0].id.ends_with("new"));
    }

    #[test]
    fn parse_feed_stops_at_max_results() {
        let xml = feed(&[
            ("a", "A", "2026-10-15T00:00:00Z"),
            ("b", "B", "2026-10-14T00:00:00Z"),
            ("c", "C", "2026-10-13T00:00:00Z"),
        ]);
        let papers = parse_feed(xml.as_bytes(), None, 2).unwrap();
        assert_eq!(papers.len(), 2);
    }

    #[test]
    fn parse_feed_rejects_garbage() {
        let err = parse_feed(b"not a feed", None, 5).unwrap_err();
        assert!(matches!(err, SearchError::Parse(_)));
    }

    #[test]
    fn query_url_carries_sort_and_limit() {
        let req = SearchRequest::new("graph neural networks", 3, 30);
        let url = build_query_url("https://export.arxiv.org/api/query", &req).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(pairs.contains(&("search_query".into(), "graph neural networks".into())));
        assert!(pairs.contains(&("max_results".into(), "6".into())));
        assert!(pairs.contains(&("sortBy".into(), "submittedDate".into())));
        assert!(pairs.contains(&("sortOrder".into(), "descending".into())));
    }

    #[test]
    fn cutoff_absent_for_unbounded_lookback() {
        let now = Utc::now();
        assert!(lookback_cutoff(0, now).is_none());
        assert_eq!(lookback_cutoff(2, now), Some(now - Duration::days(2)));
    }

    #[tokio::test]
    async fn search_hits_api_and_memoizes() {
        let server = MockServer::start().await;
        let xml = feed(&[("2410.1", "Memo", &Utc::now().to_rfc3339())]);
        Mock::given(method("GET"))
            .and(query_param("search_query", "memo test"))
            .respond_with(ResponseTemplate::new(200).set_body_string(xml))
            .expect(1)
            .mount(&server)
            .await;

        let client = ArxivClient::new(SearchConfig {
            base_url: format!("{}/api/query", server.uri()),
            ..Default::default()
        })
        .unwrap();
        let req = SearchRequest::new("memo test", 2, 30);

        let first = client.search(&req).await.unwrap();
        let second = client.search(&req).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn search_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ArxivClient::new(SearchConfig {
            base_url: format!("{}/api/query", server.uri()),
            cache_ttl_seconds: 0,
            ..Default::default()
        })
        .unwrap();

        let err = client
            .search(&SearchRequest::new("anything", 2, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Http(_)));
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let client = ArxivClient::new(SearchConfig::default()).unwrap();
        let err = client
            .search(&SearchRequest::new("   ", 2, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }
}
