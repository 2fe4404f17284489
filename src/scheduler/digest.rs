//! One daily digest cycle.
//!
//! ```text
//! profile → search (per query) → dedup → summarize (per paper)
//!         → hero image + card images → persist → render (best effort)
//! ```
//!
//! Cycles are serialized by a run lock: a cycle requested while another is
//! active returns [`CycleOutcome::AlreadyRunning`] without doing any work.

use crate::config::DigestConfig;
use crate::error::{Result, ScholarError};
use crate::model::ModelClient;
use crate::persist;
use crate::profile::ResearchProfileStore;
use crate::render::Renderer;
use crate::scheduler::record::{ArticleCard, DigestRecord, DigestStore, PaperRef, truncate_abstract};
use crate::scholar_dirs::StoragePaths;
use crate::search::{Paper, PaperSearch};
use chrono::NaiveDate;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A new record was persisted.
    Completed(DigestRecord),
    /// No research profile queries exist.
    Skipped,
    /// Every search came back empty.
    NoPapers,
    /// Another cycle holds the run lock.
    AlreadyRunning,
}

impl CycleOutcome {
    /// Short label for logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Skipped => "skipped (no research queries)",
            Self::NoPapers => "no papers found",
            Self::AlreadyRunning => "already running",
        }
    }
}

/// Merge per-query results keyed by paper id and keep the first `top_k`.
///
/// An id keeps the position of its first occurrence and the content of
/// its last.
pub fn dedupe_papers(papers: Vec<Paper>, top_k: usize) -> Vec<Paper> {
    let mut order: Vec<String> = Vec::new();
    let mut latest: HashMap<String, Paper> = HashMap::new();
    for paper in papers {
        if !latest.contains_key(&paper.id) {
            order.push(paper.id.clone());
        }
        latest.insert(paper.id.clone(), paper);
    }
    order
        .into_iter()
        .filter_map(|id| latest.remove(&id))
        .take(top_k)
        .collect()
}

/// One line per paper, fed to the hero prompt.
pub fn digest_overview(papers: &[Paper]) -> String {
    papers
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {}: {}\n", i + 1, p.title, truncate_abstract(&p.abstract_text)))
        .collect()
}

/// Runs digest cycles against injected collaborators.
pub struct DigestEngine {
    config: DigestConfig,
    profiles: ResearchProfileStore,
    store: DigestStore,
    search: Arc<dyn PaperSearch>,
    model: Arc<dyn ModelClient>,
    renderer: Renderer,
    assets_dir: PathBuf,
    html_path: PathBuf,
    run_lock: tokio::sync::Mutex<()>,
}

impl DigestEngine {
    /// Engine writing under `paths`.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Render`] if the digest template cannot be compiled.
    pub fn new(
        config: DigestConfig,
        paths: &StoragePaths,
        search: Arc<dyn PaperSearch>,
        model: Arc<dyn ModelClient>,
    ) -> Result<Self> {
        Ok(Self {
            config,
            profiles: ResearchProfileStore::new(paths.profile_file()),
            store: DigestStore::new(paths.digest_file()),
            search,
            model,
            renderer: Renderer::new()?,
            assets_dir: paths.digests_dir(),
            html_path: paths.digest_html_file(),
            run_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// The latest-record store this engine writes.
    pub fn store(&self) -> &DigestStore {
        &self.store
    }

    /// Digest settings.
    pub fn config(&self) -> &DigestConfig {
        &self.config
    }

    /// Whether a cycle currently holds the run lock.
    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Run one cycle dated `date`.
    ///
    /// # Errors
    ///
    /// Fails when the hero image cannot be produced or the record cannot be
    /// persisted. The previous record stays authoritative in both cases.
    pub async fn run_cycle(&self, date: NaiveDate) -> Result<CycleOutcome> {
        let Ok(_running) = self.run_lock.try_lock() else {
            info!("digest cycle already running, request coalesced");
            return Ok(CycleOutcome::AlreadyRunning);
        };
        let started = std::time::Instant::now();
        info!(%date, "digest cycle started");

        let profiles = self.profiles.clone();
        let profile = tokio::task::spawn_blocking(move || profiles.load())
            .await
            .map_err(|e| ScholarError::Scheduler(format!("profile load task failed: {e}")))?;
        let queries: Vec<String> = profile
            .queries()
            .take(self.config.max_queries)
            .map(str::to_owned)
            .collect();
        if queries.is_empty() {
            info!("no research queries in profile, skipping digest");
            return Ok(CycleOutcome::Skipped);
        }

        let mut found = Vec::new();
        for query in &queries {
            let papers = self
                .search
                .search(query, self.config.results_per_query, self.config.days_back)
                .await;
            debug!(%query, count = papers.len(), "search finished");
            found.extend(papers);
        }

        let papers = dedupe_papers(found, self.config.top_k);
        if papers.is_empty() {
            info!("no papers found for today's digest");
            return Ok(CycleOutcome::NoPapers);
        }
        info!(count = papers.len(), "summarizing papers");

        let mut cards: Vec<ArticleCard> = futures_util::stream::iter(papers.clone())
            .map(|paper| async move { self.summarize(&paper).await })
            .buffered(self.config.summary_concurrency.max(1))
            .collect()
            .await;

        let hero_prompt = self
            .model
            .generate_digest_prompt(&digest_overview(&papers))
            .await
            .map_err(|e| ScholarError::Scheduler(format!("hero prompt failed: {e}")))?;
        let hero_file = self
            .model
            .generate_image(&hero_prompt, &self.assets_dir)
            .await
            .map_err(|e| ScholarError::Scheduler(format!("hero image failed: {e}")))?;

        let card_images: Vec<Option<String>> = futures_util::stream::iter(cards.clone())
            .map(|card| async move { self.card_image(&card).await })
            .buffered(self.config.summary_concurrency.max(1))
            .collect()
            .await;
        for (card, image) in cards.iter_mut().zip(card_images) {
            card.image_url = image;
        }

        let record = DigestRecord {
            date,
            image_url: self.config.asset_url(&hero_file),
            papers: papers.iter().map(PaperRef::from).collect(),
            items: cards,
        };
        let store = self.store.clone();
        let saved = record.clone();
        tokio::task::spawn_blocking(move || store.save(&saved))
            .await
            .map_err(|e| ScholarError::Scheduler(format!("persist task failed: {e}")))??;
        info!(
            items = record.items.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "digest persisted"
        );

        self.render_html(&record);
        Ok(CycleOutcome::Completed(record))
    }

    async fn summarize(&self, paper: &Paper) -> ArticleCard {
        match self.model.summarize_text(&paper.abstract_text).await {
            Ok(summary) if !summary.one_sentence_summary.trim().is_empty() => {
                ArticleCard::summarized(paper, summary.one_sentence_summary.trim())
            }
            Ok(_) => {
                warn!(paper = %paper.id, "empty summary, using abstract");
                ArticleCard::fallback(paper)
            }
            Err(e) => {
                warn!(paper = %paper.id, "summary failed, using abstract: {e}");
                ArticleCard::fallback(paper)
            }
        }
    }

    async fn card_image(&self, card: &ArticleCard) -> Option<String> {
        let description = format!("{}: {}", card.title, card.summary);
        let generated = match self.model.generate_image_prompt(&description).await {
            Ok(prompt) => self.model.generate_image(&prompt, &self.assets_dir).await,
            Err(e) => Err(e),
        };
        match generated {
            Ok(filename) => Some(self.config.asset_url(&filename)),
            Err(e) => {
                warn!(paper = %card.paper_id, "card image failed, text-only card: {e}");
                None
            }
        }
    }

    fn render_html(&self, record: &DigestRecord) {
        let written = self
            .renderer
            .digest(record)
            .and_then(|html| persist::write_bytes_atomic(&self.html_path, html.as_bytes()));
        match written {
            Ok(()) => debug!(path = %self.html_path.display(), "digest HTML rendered"),
            Err(e) => warn!("digest HTML rendering failed, record kept: {e}"),
        }
    }
}
