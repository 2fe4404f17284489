//! Gemini REST adapter.
//!
//! Implements [`ModelClient`] against the Generative Language API:
//!
//! - text and JSON generation via `models/{model}:generateContent`
//! - PDF summarization through the resumable File API
//!   (start → upload/finalize → poll until `ACTIVE`)
//! - image generation, decoding inline base64 image data to disk

use crate::config::ModelConfig;
use crate::error::{Result, ScholarError};
use crate::model::{LibraryAnalysis, LibraryDocument, ModelClient, StructuredSummary, prompts};
use crate::progress::ProgressReporter;
use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;

/// arXiv rejects non-browser agents on some mirrors.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const DOWNLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Characters of each library document sent for analysis.
const LIBRARY_EXCERPT_CHARS: usize = 4000;

// ── Wire types ─────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.parts()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    fn inline_image(&self) -> Option<&InlineData> {
        self.parts().find_map(|p| p.inline_data.as_ref())
    }

    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedFile {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    mime_type: String,
}

// ── Error mapping ──────────────────────────────────────────────

/// Map an HTTP error response to a model error.
fn map_http_error(status: reqwest::StatusCode, body: &str) -> ScholarError {
    let detail = extract_error_message(body);
    match status.as_u16() {
        401 | 403 => ScholarError::Model(format!("authentication failed: {detail}")),
        429 => ScholarError::Model(format!("rate limit exceeded: {detail}")),
        _ => ScholarError::Model(format!("HTTP {status}: {detail}")),
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                "no response body".to_string()
            } else {
                body.chars().take(500).collect()
            }
        })
}

/// Parse a JSON payload, tolerating a surrounding Markdown code fence.
fn parse_json_text(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim())
        .map_err(|e| ScholarError::Model(format!("model returned invalid JSON: {e}")))
}

fn image_extension(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

// ── Client ─────────────────────────────────────────────────────

/// Gemini implementation of [`ModelClient`].
pub struct GeminiClient {
    api_key: String,
    config: ModelConfig,
    client: reqwest::Client,
    download_client: reqwest::Client,
}

impl GeminiClient {
    /// Build a client, resolving the API key from config or environment.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Config`] when no API key is available or the
    /// HTTP client cannot be built.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        Self::with_api_key(config, api_key)
    }

    /// Build a client with an explicit API key.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Config`] when the HTTP client cannot be built.
    pub fn with_api_key(config: &ModelConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| ScholarError::Config(format!("failed to build HTTP client: {e}")))?;
        let download_client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .connect_timeout(DOWNLOAD_CONNECT_TIMEOUT)
            .read_timeout(DOWNLOAD_READ_TIMEOUT)
            .build()
            .map_err(|e| ScholarError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            config: config.clone(),
            client,
            download_client,
        })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    async fn generate(&self, model: &str, body: &Value) -> Result<GenerateResponse> {
        let url = format!("{}/v1beta/models/{model}:generateContent", self.base_url());
        tracing::debug!(model, "sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ScholarError::Model(format!("connection error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read body".into());
            tracing::warn!(%status, "generateContent returned error");
            return Err(map_http_error(status, &body));
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| ScholarError::Model(format!("unexpected response shape: {e}")))
    }

    async fn generate_json(&self, parts: Vec<Value>) -> Result<Value> {
        let body = json!({
            "contents": [{"role": "user", "parts": parts}],
            "generationConfig": {"responseMimeType": "application/json"},
        });
        let response = self.generate(&self.config.text_model, &body).await?;
        parse_json_text(&response.text())
    }

    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
        });
        let text = self
            .generate(&self.config.text_model, &body)
            .await?
            .text()
            .trim()
            .to_owned();
        if text.is_empty() {
            return Err(ScholarError::Model("model returned an empty response".into()));
        }
        Ok(text)
    }

    async fn download_pdf(&self, pdf_url: &str) -> Result<Vec<u8>> {
        let response = self
            .download_client
            .get(pdf_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ScholarError::Model(format!("download failed: {e}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ScholarError::Model(format!("download failed: {e}")))?;
        tracing::debug!(bytes = bytes.len(), "PDF downloaded");
        Ok(bytes.to_vec())
    }

    /// Upload with bounded retries.
    async fn upload_pdf(&self, bytes: &[u8], display_name: &str) -> Result<UploadedFile> {
        let attempts = self.config.upload_retries.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.upload_once(bytes, display_name).await {
                Ok(file) => return Ok(file),
                Err(e) => {
                    tracing::warn!(attempt, attempts, "file upload failed: {e}");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                    }
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| ScholarError::Model("file upload was not attempted".into())))
    }

    async fn upload_once(&self, bytes: &[u8], display_name: &str) -> Result<UploadedFile> {
        let start_url = format!("{}/upload/v1beta/files", self.base_url());
        let start = self
            .client
            .post(&start_url)
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", "application/pdf")
            .json(&json!({"file": {"display_name": display_name}}))
            .send()
            .await
            .map_err(|e| ScholarError::Model(format!("upload start failed: {e}")))?;

        if !start.status().is_success() {
            let status = start.status();
            let body = start.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| ScholarError::Model("upload session URL missing".into()))?;

        let finalize = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| ScholarError::Model(format!("upload failed: {e}")))?;

        if !finalize.status().is_success() {
            let status = finalize.status();
            let body = finalize.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }

        let uploaded = finalize
            .json::<UploadResponse>()
            .await
            .map_err(|e| ScholarError::Model(format!("unexpected upload response: {e}")))?;
        Ok(uploaded.file)
    }

    async fn get_file(&self, name: &str) -> Result<UploadedFile> {
        let url = format!("{}/v1beta/{name}", self.base_url());
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| ScholarError::Model(format!("file status request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }

        response
            .json::<UploadedFile>()
            .await
            .map_err(|e| ScholarError::Model(format!("unexpected file status: {e}")))
    }

    /// Poll while the uploaded file is still processing.
    async fn wait_until_active(
        &self,
        mut file: UploadedFile,
        progress: &ProgressReporter,
    ) -> Result<UploadedFile> {
        let mut polls = 0;
        while file.state == "PROCESSING" {
            if polls >= self.config.upload_poll_attempts {
                return Err(ScholarError::Model(format!(
                    "file {} still processing after {polls} checks",
                    file.name
                )));
            }
            progress.report("Gemini is processing the file...").await;
            tokio::time::sleep(Duration::from_secs(self.config.upload_poll_secs)).await;
            file = self.get_file(&file.name).await?;
            polls += 1;
        }

        if file.state == "FAILED" {
            return Err(ScholarError::Model(
                "Gemini failed to process the PDF file".into(),
            ));
        }
        Ok(file)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn summarize_paper(
        &self,
        pdf_url: &str,
        progress: &ProgressReporter,
    ) -> Result<StructuredSummary> {
        progress.report("Downloading PDF from arXiv...").await;
        let bytes = self.download_pdf(pdf_url).await?;

        progress.report("Uploading PDF to Gemini...").await;
        let display_name = pdf_url
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or("paper.pdf");
        let file = self.upload_pdf(&bytes, display_name).await?;
        let file = self.wait_until_active(file, progress).await?;

        progress.report("Reading and summarizing paper...").await;
        let mime_type = if file.mime_type.is_empty() {
            "application/pdf"
        } else {
            file.mime_type.as_str()
        };
        let value = self
            .generate_json(vec![
                json!({"file_data": {"mime_type": mime_type, "file_uri": file.uri}}),
                json!({"text": prompts::summarize_paper()}),
            ])
            .await?;
        let summary = StructuredSummary::from_model_json(value)?;

        progress.report("Summary generated. Rendering poster...").await;
        Ok(summary)
    }

    async fn summarize_text(&self, text: &str) -> Result<StructuredSummary> {
        let value = self
            .generate_json(vec![json!({"text": prompts::summarize_text(text)})])
            .await?;
        StructuredSummary::from_model_json(value)
    }

    async fn generate_image_prompt(&self, description: &str) -> Result<String> {
        self.generate_text(&prompts::image_prompt(description)).await
    }

    async fn generate_digest_prompt(&self, digest_text: &str) -> Result<String> {
        self.generate_text(&prompts::digest_prompt(digest_text)).await
    }

    async fn generate_image(&self, prompt: &str, output_dir: &Path) -> Result<String> {
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": {"responseModalities": ["TEXT", "IMAGE"]},
        });
        let response = self.generate(&self.config.image_model, &body).await?;
        let image = response
            .inline_image()
            .ok_or_else(|| ScholarError::Model("response contained no image data".into()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(image.data.as_bytes())
            .map_err(|e| ScholarError::Model(format!("invalid image data: {e}")))?;

        let filename = format!(
            "{}.{}",
            uuid::Uuid::new_v4().simple(),
            image_extension(&image.mime_type)
        );
        tokio::fs::create_dir_all(output_dir).await?;
        tokio::fs::write(output_dir.join(&filename), &bytes).await?;
        tracing::info!(%filename, bytes = bytes.len(), "image generated");
        Ok(filename)
    }

    async fn analyze_library(&self, documents: &[LibraryDocument]) -> Result<LibraryAnalysis> {
        if documents.is_empty() {
            return Err(ScholarError::Model("no library documents to analyze".into()));
        }
        let library = documents
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let excerpt: String = doc.text.chars().take(LIBRARY_EXCERPT_CHARS).collect();
                format!("--- Document {} ({}) ---\n{excerpt}\n", i + 1, doc.name)
            })
            .collect::<String>();
        let value = self
            .generate_json(vec![json!({"text": prompts::analyze_library(&library)})])
            .await?;
        LibraryAnalysis::from_model_json(value)
    }
}
