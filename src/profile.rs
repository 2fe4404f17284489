//! Durable research profile.
//!
//! The profile holds the user's inferred research interests. The library
//! analysis pipeline replaces it wholesale; the digest engine reads its
//! suggested queries at the start of every cycle.

use crate::error::{Result, ScholarError};
use crate::persist;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Inferred research interests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchProfile {
    /// Search queries used by the daily digest, most relevant first.
    pub suggested_queries: Vec<String>,
    /// Free-text research directions.
    pub research_directions: Vec<String>,
    /// When the profile was last replaced. `None` for a fresh profile.
    #[serde(deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Accept RFC 3339 strings or epoch seconds; anything else reads as `None`
/// so an odd timestamp never discards the queries.
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().and_then(|secs| {
            let nanos = (secs.fract() * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
            DateTime::from_timestamp(secs.trunc() as i64, nanos)
        }),
        Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        _ => None,
    };
    Ok(parsed)
}

impl ResearchProfile {
    /// Non-empty queries, trimmed, in profile order.
    pub fn queries(&self) -> impl Iterator<Item = &str> {
        self.suggested_queries
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
    }

    /// Whether the profile has at least one usable query.
    pub fn has_queries(&self) -> bool {
        self.queries().next().is_some()
    }
}

/// File-backed store for the singleton [`ResearchProfile`].
#[derive(Debug, Clone)]
pub struct ResearchProfileStore {
    path: PathBuf,
}

impl ResearchProfileStore {
    /// Store backed by `path` (normally `StoragePaths::profile_file()`).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the profile. A missing or malformed file yields an empty profile.
    pub fn load(&self) -> ResearchProfile {
        match persist::read_json::<ResearchProfile>(&self.path) {
            Ok(Some(profile)) => profile,
            Ok(None) => ResearchProfile::default(),
            Err(e) => {
                tracing::warn!("research profile unreadable, using empty profile: {e}");
                ResearchProfile::default()
            }
        }
    }

    /// Write an empty profile if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Profile`] when the initial file cannot be written.
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        persist::write_json_atomic(&self.path, &ResearchProfile::default())
            .map_err(|e| ScholarError::Profile(e.to_string()))?;
        tracing::info!(path = %self.path.display(), "initialized empty research profile");
        Ok(())
    }

    /// Replace the whole profile. Previous content is discarded, not merged.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Profile`] when the file cannot be written; the
    /// previous profile stays on disk in that case.
    pub fn replace(
        &self,
        suggested_queries: Vec<String>,
        research_directions: Vec<String>,
    ) -> Result<ResearchProfile> {
        let profile = ResearchProfile {
            suggested_queries,
            research_directions,
            updated_at: Some(Utc::now()),
        };
        persist::write_json_atomic(&self.path, &profile)
            .map_err(|e| ScholarError::Profile(e.to_string()))?;
        tracing::info!(
            queries = profile.suggested_queries.len(),
            directions = profile.research_directions.len(),
            "research profile replaced"
        );
        Ok(profile)
    }
}
