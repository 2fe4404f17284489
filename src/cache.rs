//! Content-addressed artifact cache.
//!
//! Generated artifacts (poster summaries and HTML, library analyses) are
//! stored as one JSON document per key under a namespace directory. Keys
//! are BLAKE3 digests of the normalized input, so the same PDF URL or the
//! same set of file ids always maps to the same entry.
//!
//! The cache is best-effort: unreadable entries are misses and write
//! failures are logged, never propagated to the caller.

use crate::error::ScholarError;
use crate::persist;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

/// A JSON object stored in the cache.
pub type Artifact = Map<String, Value>;

/// Cache partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Per-paper poster summary and HTML.
    Posters,
    /// Library analysis keyed by the uploaded file-id set.
    Library,
}

impl CacheNamespace {
    /// Directory name under the cache root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Posters => "posters",
            Self::Library => "library",
        }
    }

    /// Parse a namespace from its directory name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "posters" | "poster" => Some(Self::Posters),
            "library" => Some(Self::Library),
            _ => None,
        }
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Hex digest identifying a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a single source URL. Surrounding whitespace is ignored.
    pub fn for_url(url: &str) -> Self {
        Self::digest(url.trim().as_bytes())
    }

    /// Order-independent key for a set of identifiers.
    ///
    /// Ids are trimmed, sorted and deduplicated before hashing, so
    /// `["b", "a"]` and `["a", "b", "a"]` produce the same key.
    pub fn for_id_set<S: AsRef<str>>(ids: &[S]) -> Self {
        let mut normalized: Vec<&str> = ids
            .iter()
            .map(|id| id.as_ref().trim())
            .filter(|id| !id.is_empty())
            .collect();
        normalized.sort_unstable();
        normalized.dedup();
        Self::digest(normalized.join("\n").as_bytes())
    }

    fn digest(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Filesystem-backed artifact cache.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    /// Cache rooted at `root`. Namespace directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, namespace: CacheNamespace, key: &CacheKey) -> PathBuf {
        self.root
            .join(namespace.dir_name())
            .join(format!("{}.json", key.as_str()))
    }

    /// Look up an artifact. Missing, unreadable and non-object entries are misses.
    pub fn get(&self, namespace: CacheNamespace, key: &CacheKey) -> Option<Artifact> {
        let path = self.entry_path(namespace, key);
        match persist::read_json::<Value>(&path) {
            Ok(Some(Value::Object(map))) => {
                tracing::debug!(%namespace, %key, "artifact cache hit");
                Some(map)
            }
            Ok(Some(_)) => {
                tracing::warn!(path = %path.display(), "cache entry is not a JSON object, ignoring");
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("ignoring unreadable cache entry: {e}");
                None
            }
        }
    }

    /// Store an artifact, replacing any previous entry for the key.
    ///
    /// Failures are logged and swallowed.
    pub fn put(&self, namespace: CacheNamespace, key: &CacheKey, artifact: &Artifact) {
        let path = self.entry_path(namespace, key);
        if let Err(e) = persist::write_json_atomic(&path, artifact) {
            tracing::warn!(%namespace, %key, "failed to write cache entry: {e}");
        } else {
            tracing::debug!(%namespace, %key, "artifact cached");
        }
    }

    /// Remove every entry in a namespace. Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Cache`] if the namespace directory cannot be listed.
    pub fn clear(&self, namespace: CacheNamespace) -> crate::Result<usize> {
        let listing_failed =
            |e: std::io::Error| ScholarError::Cache(format!("listing {namespace} cache: {e}"));
        let dir = self.root.join(namespace.dir_name());
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(listing_failed(e)),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry.map_err(listing_failed)?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::warn!(path = %path.display(), "failed to remove cache entry: {e}"),
                }
            }
        }
        tracing::info!(%namespace, removed, "artifact cache cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use serde_json::json;

    fn artifact(value: Value) -> Artifact {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn url_key_ignores_surrounding_whitespace() {
        assert_eq!(
            CacheKey::for_url("https://arxiv.org/pdf/1"),
            CacheKey::for_url("  https://arxiv.org/pdf/1\n")
        );
        assert_ne!(
            CacheKey::for_url("https://arxiv.org/pdf/1"),
            CacheKey::for_url("https://arxiv.org/pdf/2")
        );
    }

    #[test]
    fn id_set_key_is_order_independent() {
        let a = CacheKey::for_id_set(&["f2", "f1"]);
        let b = CacheKey::for_id_set(&["f1", "f2", " f1 "]);
        assert_eq!(a, b);
        assert_ne!(a, CacheKey::for_id_set(&["f1"]));
    }

    #[test]
    fn key_is_hex_digest() {
        let key = CacheKey::for_url("x");
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn put_then_get_returns_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        let key = CacheKey::for_url("https://example.org/a.pdf");

        cache.put(CacheNamespace::Posters, &key, &artifact(json!({"a": 1})));

        let got = cache.get(CacheNamespace::Posters, &key).unwrap();
        assert_eq!(Value::Object(got), json!({"a": 1}));
    }

    #[test]
    fn namespaces_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        let key = CacheKey::for_url("same");

        cache.put(CacheNamespace::Posters, &key, &artifact(json!({"k": "p"})));
        assert!(cache.get(CacheNamespace::Library, &key).is_none());
    }

    #[test]
    fn missing_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        assert!(
            cache
                .get(CacheNamespace::Library, &CacheKey::for_url("none"))
                .is_none()
        );
    }

    #[test]
    fn corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        let key = CacheKey::for_url("corrupt");
        let path = cache.entry_path(CacheNamespace::Posters, &key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{truncated").unwrap();

        assert!(cache.get(CacheNamespace::Posters, &key).is_none());
    }

    #[test]
    fn non_object_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        let key = CacheKey::for_url("list");
        let path = cache.entry_path(CacheNamespace::Posters, &key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[1, 2]").unwrap();

        assert!(cache.get(CacheNamespace::Posters, &key).is_none());
    }

    #[test]
    fn put_overwrites_previous_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        let key = CacheKey::for_url("k");

        cache.put(CacheNamespace::Posters, &key, &artifact(json!({"v": 1})));
        cache.put(CacheNamespace::Posters, &key, &artifact(json!({"v": 2})));

        let got = cache.get(CacheNamespace::Posters, &key).unwrap();
        assert_eq!(got["v"], 2);
    }

    #[test]
    fn clear_removes_only_one_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        let key = CacheKey::for_url("k");

        cache.put(CacheNamespace::Posters, &key, &artifact(json!({"v": 1})));
        cache.put(CacheNamespace::Library, &key, &artifact(json!({"v": 1})));

        assert_eq!(cache.clear(CacheNamespace::Posters).unwrap(), 1);
        assert!(cache.get(CacheNamespace::Posters, &key).is_none());
        assert!(cache.get(CacheNamespace::Library, &key).is_some());
    }

    #[test]
    fn clear_on_empty_cache_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path().join("absent"));
        assert_eq!(cache.clear(CacheNamespace::Library).unwrap(), 0);
    }

    #[test]
    fn unlistable_namespace_is_a_cache_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CacheNamespace::Posters.dir_name()), "not a dir").unwrap();
        let cache = ArtifactCache::new(dir.path());

        let err = cache.clear(CacheNamespace::Posters).unwrap_err();
        assert!(matches!(err, ScholarError::Cache(_)));
    }

    #[test]
    fn namespace_names_parse() {
        assert_eq!(
            CacheNamespace::from_name("Posters"),
            Some(CacheNamespace::Posters)
        );
        assert_eq!(
            CacheNamespace::from_name("library"),
            Some(CacheNamespace::Library)
        );
        assert_eq!(CacheNamespace::from_name("other"), None);
    }
}
