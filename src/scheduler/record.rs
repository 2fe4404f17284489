//! The persisted "latest digest" record.

use crate::error::Result;
use crate::persist;
use chrono::NaiveDate;
use scholar_search::Paper;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Characters of an abstract kept when it stands in for a summary.
pub const ABSTRACT_PREVIEW_CHARS: usize = 200;

/// Authors listed on a card before " et al.".
const MAX_CARD_AUTHORS: usize = 3;

/// Result of one successful digest cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestRecord {
    /// Local calendar date of the cycle.
    pub date: NaiveDate,
    /// Hero image reference for the whole digest.
    pub image_url: String,
    /// Papers covered, in digest order.
    #[serde(default)]
    pub papers: Vec<PaperRef>,
    /// Article cards. Older records carry none.
    #[serde(default)]
    pub items: Vec<ArticleCard>,
}

/// Identity of a paper in a digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRef {
    pub id: String,
    pub title: String,
}

impl From<&Paper> for PaperRef {
    fn from(paper: &Paper) -> Self {
        Self {
            id: paper.id.clone(),
            title: paper.title.clone(),
        }
    }
}

/// One article in a digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleCard {
    pub paper_id: String,
    pub title: String,
    /// One-line summary (or a truncated abstract when summarization failed).
    pub summary: String,
    /// First three authors, joined.
    #[serde(default)]
    pub authors: String,
    /// Per-card image reference; absent cards are text-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ArticleCard {
    /// Card carrying a generated one-line summary.
    pub fn summarized(paper: &Paper, summary: impl Into<String>) -> Self {
        Self {
            paper_id: paper.id.clone(),
            title: paper.title.clone(),
            summary: summary.into(),
            authors: format_authors(&paper.authors),
            image_url: None,
        }
    }

    /// Card built only from locally available fields.
    pub fn fallback(paper: &Paper) -> Self {
        Self::summarized(paper, truncate_abstract(&paper.abstract_text))
    }
}

/// First three authors joined with ", ", suffixed " et al." when more exist.
pub fn format_authors(authors: &[String]) -> String {
    let shown = authors
        .iter()
        .take(MAX_CARD_AUTHORS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if authors.len() > MAX_CARD_AUTHORS {
        format!("{shown} et al.")
    } else {
        shown
    }
}

/// First [`ABSTRACT_PREVIEW_CHARS`] characters, with "..." when cut.
pub fn truncate_abstract(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(ABSTRACT_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_owned(),
    }
}

/// File-backed store for the single latest [`DigestRecord`].
#[derive(Debug, Clone)]
pub struct DigestStore {
    path: PathBuf,
}

impl DigestStore {
    /// Store backed by `path` (normally `StoragePaths::digest_file()`).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the latest record, `Ok(None)` when none was written yet.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ScholarError::Persist`] for an unreadable or malformed file.
    pub fn load(&self) -> Result<Option<DigestRecord>> {
        persist::read_json(&self.path)
    }

    /// Date of the latest record. Unreadable records count as absent.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        match self.load() {
            Ok(record) => record.map(|r| r.date),
            Err(e) => {
                tracing::warn!("latest digest unreadable, treating as missing: {e}");
                None
            }
        }
    }

    /// Atomically replace the latest record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ScholarError::Persist`] when the write fails; the
    /// previous record stays intact.
    pub fn save(&self, record: &DigestRecord) -> Result<()> {
        persist::write_json_atomic(&self.path, record)
    }
}
