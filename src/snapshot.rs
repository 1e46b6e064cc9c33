//! Local JSON snapshot of listening events.
//!
//! The snapshot is an array of [`EventRecord`]s. It backs two read paths:
//! training when the primary store is unavailable, and snapshot-based
//! recommendations. A missing or unreadable snapshot reads as empty.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::Path;

use crate::event::EventRecord;

/// Load every record, or an empty list if the snapshot cannot be used
#[must_use]
pub fn load_records(path: &Path) -> Vec<EventRecord> {
    if !path.exists() {
        debug!("No local snapshot at {}", path.display());
        return Vec::new();
    }

    match read_records(path) {
        Ok(records) => records,
        Err(e) => {
            warn!("Error reading local snapshot: {e:#}");
            Vec::new()
        }
    }
}

fn read_records(path: &Path) -> Result<Vec<EventRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw).with_context(|| format!("Invalid snapshot in {}", path.display()))
}

/// Records that may be used for training, filtered client-side with the
/// same predicate the primary store applies
#[must_use]
pub fn load_eligible(path: &Path) -> Vec<EventRecord> {
    load_records(path)
        .into_iter()
        .filter(EventRecord::is_eligible)
        .collect()
}
