//! Atomic JSON file operations.
//!
//! Every durable record (cache entries, research profile, latest digest)
//! is written temp file → fsync → rename so that a reader never observes
//! a partially written document. Temp names are unique per write so
//! concurrent writers to the same path resolve last-writer-wins.

use crate::error::{Result, ScholarError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::Path;

/// Serialize `value` as pretty JSON and atomically replace `path`.
///
/// # Errors
///
/// Returns [`ScholarError::Persist`] on serialization, write, sync or
/// rename failure. The previous file content is untouched on error.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| ScholarError::Persist(format!("failed to serialize record: {e}")))?;
    write_bytes_atomic(path, &json)
}

/// Atomically replace `path` with `bytes`.
///
/// # Errors
///
/// Returns [`ScholarError::Persist`] on any filesystem failure.
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ScholarError::Persist(format!(
                "failed to create directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let tmp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));

    let result = write_and_rename(&tmp_path, path, bytes);

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}

fn write_and_rename(tmp_path: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = std::fs::File::create(tmp_path).map_err(|e| {
        ScholarError::Persist(format!(
            "failed to create temp file '{}': {e}",
            tmp_path.display()
        ))
    })?;
    file.write_all(bytes)
        .map_err(|e| ScholarError::Persist(format!("failed to write temp file: {e}")))?;
    file.sync_all()
        .map_err(|e| ScholarError::Persist(format!("failed to sync temp file: {e}")))?;
    std::fs::rename(tmp_path, path).map_err(|e| {
        ScholarError::Persist(format!(
            "failed to rename '{}' to '{}': {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}

/// Read and deserialize a JSON file.
///
/// Returns `Ok(None)` when the file does not exist.
///
/// # Errors
///
/// Returns [`ScholarError::Persist`] when the file exists but cannot be
/// read or parsed.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ScholarError::Persist(format!(
                "failed to read '{}': {e}",
                path.display()
            )));
        }
    };

    serde_json::from_slice(&bytes).map(Some).map_err(|e| {
        ScholarError::Persist(format!("failed to parse '{}': {e}", path.display()))
    })
}
