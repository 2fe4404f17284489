//! Request-triggered pipelines: paper poster, cover image and library analysis.
//!
//! Each builder returns a [`Pipeline`] ready for
//! [`ProgressTaskRunner::run`](crate::progress::ProgressTaskRunner::run).

use crate::cache::{CacheKey, CacheNamespace};
use crate::error::{Result, ScholarError};
use crate::model::{LibraryAnalysis, LibraryDocument, ModelClient, StructuredSummary};
use crate::profile::ResearchProfileStore;
use crate::progress::{BlockingStage, FnStage, Pipeline};
use crate::render::Renderer;
use crate::scholar_dirs::StoragePaths;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builds the request-triggered pipelines over shared collaborators.
#[derive(Clone)]
pub struct Pipelines {
    model: Arc<dyn ModelClient>,
    renderer: Arc<Renderer>,
    profiles: ResearchProfileStore,
    posters_dir: PathBuf,
}

fn str_field(input: &Value, field: &str) -> Result<String> {
    input
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| ScholarError::Pipeline(format!("missing `{field}` in pipeline input")))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| ScholarError::Pipeline(e.to_string()))
}

impl Pipelines {
    /// Pipelines writing generated images under `paths.posters_dir()`.
    pub fn new(
        model: Arc<dyn ModelClient>,
        renderer: Arc<Renderer>,
        profiles: ResearchProfileStore,
        paths: &StoragePaths,
    ) -> Self {
        Self {
            model,
            renderer,
            profiles,
            posters_dir: paths.posters_dir(),
        }
    }

    /// Summarize the paper at `pdf_url` and render it as an HTML poster.
    ///
    /// Completes with `{html_content, summary_json}`; cached by URL.
    pub fn poster(&self, pdf_url: &str) -> Pipeline {
        let model = Arc::clone(&self.model);
        let renderer = Arc::clone(&self.renderer);

        Pipeline::new("poster", json!({ "pdf_url": pdf_url }))
            .stage(FnStage::new("summarize", move |input, progress| {
                let model = Arc::clone(&model);
                async move {
                    let url = str_field(&input, "pdf_url")?;
                    let summary = model.summarize_paper(&url, &progress).await?;
                    to_value(&summary)
                }
            }))
            .stage(BlockingStage::new("render", move |input, _progress| {
                let summary = StructuredSummary::from_model_json(input)?;
                let html = renderer.poster(&summary)?;
                Ok(json!({
                    "html_content": html,
                    "summary_json": to_value(&summary)?,
                }))
            }))
            .cached(CacheNamespace::Posters, CacheKey::for_url(pdf_url))
    }

    /// Generate a cover illustration from a free-text description.
    ///
    /// Completes with `{prompt, filename}`; the file lands in the posters directory.
    pub fn cover(&self, description: &str) -> Pipeline {
        let prompt_model = Arc::clone(&self.model);
        let image_model = Arc::clone(&self.model);
        let posters_dir = self.posters_dir.clone();

        Pipeline::new("cover", json!({ "description": description }))
            .stage(FnStage::new("image-prompt", move |input, progress| {
                let model = Arc::clone(&prompt_model);
                async move {
                    let description = str_field(&input, "description")?;
                    progress.report("Writing an image prompt...").await;
                    let prompt = model.generate_image_prompt(&description).await?;
                    Ok(json!({ "prompt": prompt }))
                }
            }))
            .stage(FnStage::new("image", move |input, progress| {
                let model = Arc::clone(&image_model);
                let posters_dir = posters_dir.clone();
                async move {
                    let prompt = str_field(&input, "prompt")?;
                    progress.report("Generating image...").await;
                    let filename = model.generate_image(&prompt, &posters_dir).await?;
                    Ok(json!({ "prompt": prompt, "filename": filename }))
                }
            }))
    }

    /// Infer research interests from `documents` and replace the research profile.
    ///
    /// Completes with the analysis; cached by the set of file ids.
    pub fn library(&self, documents: Vec<LibraryDocument>) -> Pipeline {
        let model = Arc::clone(&self.model);
        let profiles = self.profiles.clone();
        let key = CacheKey::for_id_set(
            &documents
                .iter()
                .map(|d| d.file_id.as_str())
                .collect::<Vec<_>>(),
        );

        Pipeline::new("library", json!({ "documents": documents }))
            .stage(FnStage::new("analyze", move |input, progress| {
                let model = Arc::clone(&model);
                async move {
                    let documents: Vec<LibraryDocument> = input
                        .get("documents")
                        .cloned()
                        .map(serde_json::from_value)
                        .transpose()
                        .map_err(|e| ScholarError::Pipeline(format!("invalid documents: {e}")))?
                        .unwrap_or_default();
                    if documents.is_empty() {
                        return Err(ScholarError::Pipeline("no documents to analyze".into()));
                    }
                    progress
                        .report(format!("Analyzing {} documents...", documents.len()))
                        .await;
                    let analysis = model.analyze_library(&documents).await?;
                    to_value(&analysis)
                }
            }))
            .stage(BlockingStage::new("update-profile", move |input, progress| {
                let analysis = LibraryAnalysis::from_model_json(input)?;
                progress.report_blocking("Updating research profile...");
                profiles.replace(
                    analysis.suggested_queries.clone(),
                    analysis.research_directions.clone(),
                )?;
                to_value(&analysis)
            }))
            .cached(CacheNamespace::Library, key)
    }
}

/// Read a local text file as a library document identified by its content hash.
///
/// # Errors
///
/// Returns an I/O error when the file cannot be read as UTF-8 text.
pub fn read_library_document(path: &Path) -> Result<LibraryDocument> {
    let text = std::fs::read_to_string(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(LibraryDocument {
        file_id: blake3::hash(text.as_bytes()).to_hex().to_string(),
        name,
        text,
    })
}
