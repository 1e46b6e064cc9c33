//! # Configuration Module
//!
//! Data directory management and runtime settings for Moodmix.
//!
//! ## Data Storage
//!
//! Everything lives in the platform-standard data directory:
//! - Linux: `~/.local/share/moodmix/`
//! - macOS: `~/Library/Application Support/moodmix/`
//! - Windows: `%APPDATA%\moodmix\`
//!
//! | File                    | Purpose                                        |
//! |-------------------------|------------------------------------------------|
//! | `events.db`             | Primary listening-event store + feature table  |
//! | `mood_logs_local.json`  | Local snapshot used when the store is missing  |
//! | `model_centroids.json`  | Learned segment profiles                       |
//! | `model_centroids.lock`  | Single-writer lock held while training         |
//! | `moodmix.json`          | Optional overrides for any field below         |

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the application subdirectory inside the platform data directory
pub const APP_DIR_NAME: &str = "moodmix";

/// Name of the optional overrides file inside the data directory
pub const OVERRIDES_FILE_NAME: &str = "moodmix.json";

/// Returns the platform-appropriate data directory for Moodmix, creating it
/// if needed.
///
/// # Errors
///
/// Fails if the system data directory cannot be determined or the
/// `moodmix` subdirectory cannot be created.
///
/// # Examples
///
/// ```no_run
/// use moodmix::config::get_data_dir;
///
/// let data_dir = get_data_dir()?;
/// println!("Data location: {}", data_dir.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        ))?;

    let app_dir = data_dir.join(APP_DIR_NAME);
    ensure_dir(&app_dir)?;

    Ok(app_dir)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!(
            "Failed to create Moodmix data directory at {}. Please check file permissions.",
            dir.display()
        ))
}

/// Weighting policy and ingestion rules for training
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Weight of an event carrying explicit "like" feedback
    pub like_weight: u32,
    /// Weight of every other eligible event
    pub neutral_weight: u32,
    /// Track ids starting with this prefix are synthetic placeholders
    pub placeholder_prefix: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            like_weight: 2,
            neutral_weight: 1,
            placeholder_prefix: "mock-".to_string(),
        }
    }
}

impl TrainingConfig {
    /// Check the weights can produce a mean.
    ///
    /// # Errors
    ///
    /// Returns an error if either weight is zero.
    pub fn validate(&self) -> Result<()> {
        if self.like_weight == 0 || self.neutral_weight == 0 {
            anyhow::bail!(
                "Training weights must be at least 1 (like_weight = {}, neutral_weight = {})",
                self.like_weight,
                self.neutral_weight
            );
        }
        Ok(())
    }
}

/// Candidate rules for snapshot-based recommendations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Only snapshot records tagged with this source are recommended
    pub curated_source: String,
    /// Number of tracks returned when the caller does not ask for a count
    pub default_count: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            curated_source: "dataset".to_string(),
            default_count: 8,
        }
    }
}

/// Configuration for runtime behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Directory every default path below is derived from
    pub data_dir: PathBuf,
    /// SQLite database holding listening events and the feature catalogue
    pub events_db_path: PathBuf,
    /// JSON snapshot of listening events
    pub snapshot_path: PathBuf,
    /// JSON document holding the learned model
    pub model_path: PathBuf,
    /// Lock file guarding model read-modify-write
    pub lock_path: PathBuf,
    pub training: TrainingConfig,
    pub fallback: FallbackConfig,
}

/// Partial configuration read from `moodmix.json`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigOverrides {
    events_db_path: Option<PathBuf>,
    snapshot_path: Option<PathBuf>,
    model_path: Option<PathBuf>,
    lock_path: Option<PathBuf>,
    training: Option<TrainingConfig>,
    fallback: Option<FallbackConfig>,
}

impl RuntimeConfig {
    /// Configuration rooted at the platform data directory, with overrides applied
    pub fn new() -> Result<Self> {
        Self::load(get_data_dir()?)
    }

    /// Configuration rooted at `data_dir` with default file names and no overrides
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            events_db_path: data_dir.join("events.db"),
            snapshot_path: data_dir.join("mood_logs_local.json"),
            model_path: data_dir.join("model_centroids.json"),
            lock_path: data_dir.join("model_centroids.lock"),
            training: TrainingConfig::default(),
            fallback: FallbackConfig::default(),
            data_dir,
        }
    }

    /// Configuration rooted at `data_dir`, applying `moodmix.json` if it exists.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created, or the overrides file exists
    /// but cannot be read, cannot be parsed or sets a zero training weight.
    pub fn load(data_dir: PathBuf) -> Result<Self> {
        ensure_dir(&data_dir)?;
        let mut config = Self::with_data_dir(data_dir);

        let overrides_path = config.data_dir.join(OVERRIDES_FILE_NAME);
        if overrides_path.exists() {
            debug!("Applying configuration overrides from {}", overrides_path.display());
            let raw = fs::read_to_string(&overrides_path)
                .with_context(|| format!("Failed to read {}", overrides_path.display()))?;
            let overrides: ConfigOverrides = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid configuration in {}", overrides_path.display()))?;
            config.apply(overrides);
            config.training.validate()
                .with_context(|| format!("Invalid configuration in {}", overrides_path.display()))?;
        }

        Ok(config)
    }

    fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(path) = overrides.events_db_path {
            self.events_db_path = path;
        }
        if let Some(path) = overrides.snapshot_path {
            self.snapshot_path = path;
        }
        if let Some(path) = overrides.model_path {
            self.model_path = path;
        }
        if let Some(path) = overrides.lock_path {
            self.lock_path = path;
        }
        if let Some(training) = overrides.training {
            self.training = training;
        }
        if let Some(fallback) = overrides.fallback {
            self.fallback = fallback;
        }
    }
}
