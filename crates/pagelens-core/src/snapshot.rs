//! Durable metadata snapshot: record id → record, rewritten wholesale.
//!
//! The extraction orchestrator rewrites the snapshot after every completed
//! page, so the file on disk is always a complete, valid JSON document as of
//! the last page boundary. A crash mid-page loses at most that page's
//! partial work.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::PageImageRecord;

/// The full metadata mapping for one document.
pub type Snapshot = BTreeMap<String, PageImageRecord>;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Overwrite the snapshot file with the current mapping, pretty-printed
/// UTF-8 JSON. Whole-file overwrite, never append.
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<Snapshot, SnapshotError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
