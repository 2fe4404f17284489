//! Daily Scholar: research digests and paper posters with live progress.
//!
//! Two independent execution domains share one artifact cache and one
//! research profile:
//!
//! - **Progress task runner**: executes a request-triggered pipeline
//!   (poster, cover image, library analysis) on its own tokio task and
//!   streams progress events to the caller.
//! - **Digest scheduler**: runs the daily research digest cycle
//!   unattended, with misfire grace and startup catch-up, and persists the
//!   latest successful digest.
//!
//! # Architecture
//!
//! ```text
//! profile → arXiv search → dedup → summarize → images → latest_digest.json
//!                                                      → latest_digest.html
//! request → Pipeline → ProgressTaskRunner → ProgressStream (progress… complete|error)
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod persist;
pub mod pipelines;
pub mod profile;
pub mod progress;
pub mod render;
pub mod scheduler;
pub mod scholar_dirs;
pub mod search;

#[cfg(test)]
mod test_utils;

pub use cache::{Artifact, ArtifactCache, CacheKey, CacheNamespace};
pub use config::ScholarConfig;
pub use error::{Result, ScholarError};
pub use model::{GeminiClient, ModelClient, StructuredSummary};
pub use pipelines::Pipelines;
pub use profile::{ResearchProfile, ResearchProfileStore};
pub use progress::{Pipeline, ProgressEvent, ProgressReporter, ProgressStream, ProgressTaskRunner};
pub use scheduler::{CycleOutcome, DigestEngine, DigestRecord, DigestScheduler, SchedulerHandle};
pub use search::{ArxivSearch, Paper, PaperSearch};
