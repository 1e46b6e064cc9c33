//! Persistence of learned segment profiles.
//!
//! The model is one JSON document mapping segment key strings to profiles:
//!
//! ```json
//! {
//!   "a|happy|18-25": {
//!     "valence": 0.667, "energy": 0.5, "danceability": 0.5,
//!     "acousticness": 0.2, "tempo": 110.0,
//!     "sampleSize": 2, "effectiveSampleSize": 3,
//!     "lastUpdated": "2024-05-01T12:00:00Z"
//!   }
//! }
//! ```
//!
//! `save` replaces the whole document. Merging with the previous state is
//! the trainer's job, done while holding a [`TrainingLock`].

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::event::SegmentKey;
use crate::features::FeatureValues;

/// Learned preference of one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentProfile {
    /// Weighted mean of the resolved feature vectors
    #[serde(flatten)]
    pub features: FeatureValues,
    /// Eligible events in the segment, resolved or not
    pub sample_size: usize,
    /// Sum of weights over events whose track resolved
    pub effective_sample_size: u64,
    pub last_updated: DateTime<Utc>,
}

/// All learned profiles, ordered by key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Model {
    profiles: BTreeMap<SegmentKey, SegmentProfile>,
}

impl Model {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &SegmentKey) -> Option<&SegmentProfile> {
        self.profiles.get(key)
    }

    /// Create or overwrite a profile, returning the previous one
    pub fn insert(&mut self, key: SegmentKey, profile: SegmentProfile) -> Option<SegmentProfile> {
        self.profiles.insert(key, profile)
    }

    #[must_use]
    pub fn contains(&self, key: &SegmentKey) -> bool {
        self.profiles.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SegmentKey, &SegmentProfile)> {
        self.profiles.iter()
    }
}

/// File-backed model storage
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted model.
    ///
    /// A missing, unreadable or malformed document yields an empty model.
    #[must_use]
    pub fn load(&self) -> Model {
        if !self.path.exists() {
            debug!("No model at {}, starting empty", self.path.display());
            return Model::new();
        }

        let parsed = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))
            .and_then(|raw| {
                serde_json::from_str::<Model>(&raw)
                    .with_context(|| format!("Invalid model document in {}", self.path.display()))
            });

        match parsed {
            Ok(model) => model,
            Err(e) => {
                warn!("Ignoring persisted model: {e:#}");
                Model::new()
            }
        }
    }

    /// Replace the persisted model.
    ///
    /// The document is written to a temporary file in the same directory and
    /// renamed over the target, so readers never observe a partial write.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The model directory cannot be created
    /// - The model cannot be serialized
    /// - The temporary file cannot be written or renamed over the target
    pub fn save(&self, model: &Model) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create model directory {}", dir.display()))?;

        let json = serde_json::to_string_pretty(model).context("Failed to serialize model")?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temporary model file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace model at {}", self.path.display()))?;

        debug!("Saved {} profiles to {}", model.len(), self.path.display());
        Ok(())
    }
}

/// Exclusive advisory lock held for a whole training run.
///
/// Released when dropped. A second run against the same lock file fails
/// immediately instead of waiting.
#[derive(Debug)]
pub struct TrainingLock {
    file: File,
    path: PathBuf,
}

impl TrainingLock {
    /// Take the lock at `path`, creating the file if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be opened, or if another
    /// process (or another handle in this one) already holds the lock.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use moodmix::profile_store::TrainingLock;
    /// use std::path::Path;
    ///
    /// let _lock = TrainingLock::acquire(Path::new("model_centroids.lock"))?;
    /// // read-modify-write the model here
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        lock_exclusive(&file)
            .with_context(|| format!("Another training run holds {}", path.display()))?;

        debug!("Acquired training lock {}", path.display());
        Ok(Self { file, path: path.to_path_buf() })
    }
}

impl Drop for TrainingLock {
    fn drop(&mut self) {
        unlock(&self.file);
        debug!("Released training lock {}", self.path.display());
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    // SAFETY: see `lock_exclusive`.
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}
