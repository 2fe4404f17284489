//! Shared collaborators for integration tests.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use daily_scholar::model::{LibraryAnalysis, LibraryDocument};
use daily_scholar::scheduler::Clock;
use daily_scholar::{ModelClient, Paper, PaperSearch, ProgressReporter, Result, ScholarError, StructuredSummary};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Paper whose abstract is longer than the card preview.
pub(crate) fn paper(id: &str) -> Paper {
    Paper {
        id: id.to_owned(),
        title: format!("Paper {id}"),
        authors: vec!["Grace Hopper".into()],
        published_date: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        abstract_text: format!("{id} abstract. {}", "retrieval ".repeat(40)),
        pdf_url: format!("https://arxiv.org/pdf/{id}"),
    }
}

/// Search returning the same papers for a fixed set of queries.
pub(crate) struct FixedSearch {
    pub(crate) by_query: HashMap<String, Vec<Paper>>,
}

impl FixedSearch {
    pub(crate) fn single(query: &str, papers: Vec<Paper>) -> Self {
        Self {
            by_query: HashMap::from([(query.to_owned(), papers)]),
        }
    }
}

#[async_trait]
impl PaperSearch for FixedSearch {
    async fn search(&self, query: &str, max_results: usize, _days_back: u32) -> Vec<Paper> {
        let mut papers = self.by_query.get(query).cloned().unwrap_or_default();
        papers.truncate(max_results);
        papers
    }
}

/// Model that fails summaries for abstracts starting with a given id.
#[derive(Default)]
pub(crate) struct FlakyModel {
    pub(crate) failing_ids: Vec<String>,
    pub(crate) cycles: AtomicUsize,
}

#[async_trait]
impl ModelClient for FlakyModel {
    async fn summarize_paper(
        &self,
        pdf_url: &str,
        progress: &ProgressReporter,
    ) -> Result<StructuredSummary> {
        progress.report("Reading and summarizing paper...").await;
        Ok(StructuredSummary {
            title: pdf_url.to_owned(),
            ..Default::default()
        })
    }

    async fn summarize_text(&self, text: &str) -> Result<StructuredSummary> {
        if self.failing_ids.iter().any(|id| text.starts_with(id.as_str())) {
            return Err(ScholarError::Model("rate limited".into()));
        }
        Ok(StructuredSummary {
            one_sentence_summary: format!(
                "generated: {}",
                text.split_whitespace().next().unwrap_or_default()
            ),
            ..Default::default()
        })
    }

    async fn generate_image_prompt(&self, description: &str) -> Result<String> {
        Ok(format!("card {description}"))
    }

    async fn generate_digest_prompt(&self, _digest_text: &str) -> Result<String> {
        self.cycles.fetch_add(1, Ordering::SeqCst);
        Ok("hero".into())
    }

    async fn generate_image(&self, prompt: &str, output_dir: &Path) -> Result<String> {
        std::fs::create_dir_all(output_dir)?;
        let filename = format!("{}.png", uuid::Uuid::new_v4());
        std::fs::write(output_dir.join(&filename), prompt)?;
        Ok(filename)
    }

    async fn analyze_library(&self, documents: &[LibraryDocument]) -> Result<LibraryAnalysis> {
        Ok(LibraryAnalysis {
            suggested_queries: documents.iter().map(|d| d.name.clone()).collect(),
            research_directions: Vec::new(),
        })
    }
}

/// Clock frozen at a settable local time.
pub(crate) struct FrozenClock(Mutex<NaiveDateTime>);

impl FrozenClock {
    pub(crate) fn new(now: NaiveDateTime) -> Self {
        Self(Mutex::new(now))
    }

    pub(crate) fn set(&self, now: NaiveDateTime) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for FrozenClock {
    fn now(&self) -> NaiveDateTime {
        *self.0.lock().unwrap()
    }
}

pub(crate) fn local(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}
