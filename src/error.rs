//! Error types for the digest and poster pipelines.

/// Top-level error type for Daily Scholar.
#[derive(Debug, thiserror::Error)]
pub enum ScholarError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Artifact cache error.
    #[error("cache error: {0}")]
    Cache(String),

    /// Research profile storage error.
    #[error("profile error: {0}")]
    Profile(String),

    /// Generative model call failed (summary, prompt, image, upload).
    #[error("model error: {0}")]
    Model(String),

    /// Paper search error.
    #[error("search error: {0}")]
    Search(String),

    /// A pipeline stage failed or the pipeline was malformed.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// Scheduler error (trigger delivery, cycle failure).
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// HTML rendering error.
    #[error("render error: {0}")]
    Render(String),

    /// Durable record persistence error.
    #[error("persist error: {0}")]
    Persist(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<scholar_search::SearchError> for ScholarError {
    fn from(e: scholar_search::SearchError) -> Self {
        Self::Search(e.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ScholarError>;
