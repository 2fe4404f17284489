//! Shared test doubles for the model and search collaborators.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::error::{Result, ScholarError};
use crate::model::{LibraryAnalysis, LibraryDocument, ModelClient, StructuredSummary};
use crate::progress::ProgressReporter;
use crate::search::{Paper, PaperSearch};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Paper with predictable fields.
pub fn paper(id: &str) -> Paper {
    Paper {
        id: id.to_owned(),
        title: format!("Title {id}"),
        authors: vec!["Ada Lovelace".into(), "Alan Turing".into()],
        published_date: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        abstract_text: format!("Abstract of {id}. {}", "detail ".repeat(40)),
        pdf_url: format!("https://arxiv.org/pdf/{id}"),
    }
}

/// Search returning canned results per query.
#[derive(Default)]
pub struct StaticSearch {
    results: HashMap<String, Vec<Paper>>,
    pub calls: Mutex<Vec<String>>,
}

impl StaticSearch {
    pub fn with(mut self, query: &str, papers: Vec<Paper>) -> Self {
        self.results.insert(query.to_owned(), papers);
        self
    }
}

#[async_trait]
impl PaperSearch for StaticSearch {
    async fn search(&self, query: &str, max_results: usize, _days_back: u32) -> Vec<Paper> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(query.to_owned());
        }
        let mut papers = self.results.get(query).cloned().unwrap_or_default();
        papers.truncate(max_results);
        papers
    }
}

/// Model whose failures are scripted per input.
#[derive(Default)]
pub struct ScriptedModel {
    /// Abstract substrings whose summary call fails.
    pub fail_summaries_for: HashSet<String>,
    pub fail_hero: bool,
    pub fail_card_images: bool,
    pub summaries: AtomicUsize,
    pub images: AtomicUsize,
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn summarize_paper(
        &self,
        pdf_url: &str,
        progress: &ProgressReporter,
    ) -> Result<StructuredSummary> {
        progress.report("Downloading PDF from arXiv...").await;
        self.summaries.fetch_add(1, Ordering::SeqCst);
        Ok(StructuredSummary {
            title: format!("Poster for {pdf_url}"),
            one_sentence_summary: "A poster summary.".into(),
            ..Default::default()
        })
    }

    async fn summarize_text(&self, text: &str) -> Result<StructuredSummary> {
        self.summaries.fetch_add(1, Ordering::SeqCst);
        if self.fail_summaries_for.iter().any(|s| text.contains(s.as_str())) {
            return Err(ScholarError::Model("summary quota exceeded".into()));
        }
        let first = text.split('.').next().unwrap_or_default();
        Ok(StructuredSummary {
            one_sentence_summary: format!("Summary: {first}"),
            ..Default::default()
        })
    }

    async fn generate_image_prompt(&self, description: &str) -> Result<String> {
        Ok(format!("illustrate {description}"))
    }

    async fn generate_digest_prompt(&self, digest_text: &str) -> Result<String> {
        Ok(format!("digest of {} papers", digest_text.lines().count()))
    }

    async fn generate_image(&self, prompt: &str, output_dir: &Path) -> Result<String> {
        let n = self.images.fetch_add(1, Ordering::SeqCst);
        let is_hero = prompt.starts_with("digest of");
        if (is_hero && self.fail_hero) || (!is_hero && self.fail_card_images) {
            return Err(ScholarError::Model("image generation refused".into()));
        }
        std::fs::create_dir_all(output_dir)?;
        let filename = format!("image-{n}.png");
        std::fs::write(output_dir.join(&filename), b"png")?;
        Ok(filename)
    }

    async fn analyze_library(&self, documents: &[LibraryDocument]) -> Result<LibraryAnalysis> {
        Ok(LibraryAnalysis {
            suggested_queries: documents.iter().map(|d| d.name.clone()).collect(),
            research_directions: vec!["direction".into()],
        })
    }
}
