//! Generative model collaborator.
//!
//! The orchestration core only sees [`ModelClient`]; [`gemini::GeminiClient`]
//! is the production implementation.

pub mod gemini;
mod prompts;

pub use gemini::GeminiClient;

use crate::error::{Result, ScholarError};
use crate::progress::ProgressReporter;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Accent colour used when a summary carries no design theme.
pub const DEFAULT_ACCENT_COLOR: &str = "#3b82f6";
/// Highlight background used when a summary carries no design theme.
pub const DEFAULT_HIGHLIGHT_BG: &str = "#eff6ff";

/// One highlighted contribution of a paper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Innovation {
    pub emoji: String,
    pub title: String,
    pub description: String,
}

/// Colours chosen by the model to match the paper's topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignTheme {
    pub accent_color: String,
    pub highlight_bg: String,
}

impl Default for DesignTheme {
    fn default() -> Self {
        Self {
            accent_color: DEFAULT_ACCENT_COLOR.to_owned(),
            highlight_bg: DEFAULT_HIGHLIGHT_BG.to_owned(),
        }
    }
}

/// Structured paper summary returned by the model.
///
/// Every field has a default so partial model output still deserializes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredSummary {
    /// Simplified, short title.
    pub title: String,
    /// Core contribution in one sentence.
    pub one_sentence_summary: String,
    pub key_innovations: Vec<Innovation>,
    /// Why the work matters.
    pub impact_statement: String,
    pub tags: Vec<String>,
    pub design_theme: DesignTheme,
}

impl StructuredSummary {
    /// Decode model output. A one-element JSON array is unwrapped.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Model`] when the value is not an object (or a
    /// list holding one).
    pub fn from_model_json(value: Value) -> Result<Self> {
        let value = unwrap_single_element(value);
        if !value.is_object() {
            return Err(ScholarError::Model(format!(
                "expected a JSON object summary, got {}",
                json_kind(&value)
            )));
        }
        serde_json::from_value(value)
            .map_err(|e| ScholarError::Model(format!("malformed summary: {e}")))
    }
}

/// A document from the user's library, submitted for interest analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryDocument {
    /// Stable identity of the uploaded file (used for the cache key).
    pub file_id: String,
    /// Display name.
    pub name: String,
    /// Extracted text.
    pub text: String,
}

/// Research interests inferred from a library.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryAnalysis {
    /// arXiv search queries, most relevant first.
    pub suggested_queries: Vec<String>,
    /// Free-text research directions.
    pub research_directions: Vec<String>,
}

impl LibraryAnalysis {
    /// Decode model output. A one-element JSON array is unwrapped.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Model`] when the value does not describe an analysis.
    pub fn from_model_json(value: Value) -> Result<Self> {
        let value = unwrap_single_element(value);
        if !value.is_object() {
            return Err(ScholarError::Model(format!(
                "expected a JSON object analysis, got {}",
                json_kind(&value)
            )));
        }
        serde_json::from_value(value)
            .map_err(|e| ScholarError::Model(format!("malformed library analysis: {e}")))
    }
}

/// Generative model operations used by the pipelines and the digest engine.
///
/// Every call may fail independently; callers decide whether a failure
/// aborts their pipeline or degrades to a fallback.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Download a paper PDF and summarize it, reporting progress along the way.
    async fn summarize_paper(
        &self,
        pdf_url: &str,
        progress: &ProgressReporter,
    ) -> Result<StructuredSummary>;

    /// Summarize plain text (an abstract).
    async fn summarize_text(&self, text: &str) -> Result<StructuredSummary>;

    /// Turn a free-text description into an image-generation prompt.
    async fn generate_image_prompt(&self, description: &str) -> Result<String>;

    /// Turn a digest overview (one line per paper) into a hero image prompt.
    async fn generate_digest_prompt(&self, digest_text: &str) -> Result<String>;

    /// Generate an image into `output_dir`, returning the stored filename.
    async fn generate_image(&self, prompt: &str, output_dir: &Path) -> Result<String>;

    /// Infer research interests from library documents.
    async fn analyze_library(&self, documents: &[LibraryDocument]) -> Result<LibraryAnalysis>;
}

fn unwrap_single_element(value: Value) -> Value {
    match value {
        Value::Array(mut items) if items.len() == 1 => items.pop().unwrap_or(Value::Null),
        other => other,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn summary_decodes_full_object() {
        let summary = StructuredSummary::from_model_json(json!({
            "title": "Sparse Retrieval Wins",
            "one_sentence_summary": "Sparse beats dense.",
            "key_innovations": [{"emoji": "🚀", "title": "Fast", "description": "Very"}],
            "impact_statement": "Cheaper search.",
            "tags": ["IR"],
            "design_theme": {"accent_color": "#112233", "highlight_bg": "#f0f0f0"}
        }))
        .unwrap();

        assert_eq!(summary.title, "Sparse Retrieval Wins");
        assert_eq!(summary.key_innovations.len(), 1);
        assert_eq!(summary.design_theme.accent_color, "#112233");
    }

    #[test]
    fn summary_unwraps_single_element_list() {
        let summary =
            StructuredSummary::from_model_json(json!([{"title": "Listed"}])).unwrap();
        assert_eq!(summary.title, "Listed");
        assert_eq!(summary.design_theme, DesignTheme::default());
    }

    #[test]
    fn summary_missing_fields_default() {
        let summary = StructuredSummary::from_model_json(json!({})).unwrap();
        assert!(summary.title.is_empty());
        assert_eq!(summary.design_theme.highlight_bg, DEFAULT_HIGHLIGHT_BG);
    }

    #[test]
    fn summary_rejects_non_objects() {
        assert!(StructuredSummary::from_model_json(json!("text")).is_err());
        assert!(StructuredSummary::from_model_json(json!([{}, {}])).is_err());
    }

    #[test]
    fn analysis_decodes() {
        let analysis = LibraryAnalysis::from_model_json(json!({
            "suggested_queries": ["graph neural networks"],
            "research_directions": ["GNN robustness"]
        }))
        .unwrap();
        assert_eq!(analysis.suggested_queries, vec!["graph neural networks"]);
    }
}
