//! Audio feature vectors and the feature store they are resolved from.
//!
//! The aggregator only needs batch lookup by track id, expressed by the
//! [`FeatureStore`] trait. Two implementations ship with the crate:
//! [`FeatureCatalog`] (in memory, loadable from JSON) and
//! [`SqliteFeatureStore`] (the `audio_features` table next to the event log).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::db;

/// The five continuous dimensions profiles are expressed in.
///
/// Everything except `tempo` lies in `[0, 1]`; `tempo` is in BPM.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureValues {
    pub valence: f64,
    pub energy: f64,
    pub danceability: f64,
    pub acousticness: f64,
    pub tempo: f64,
}

impl FeatureValues {
    #[must_use]
    pub const fn new(valence: f64, energy: f64, danceability: f64, acousticness: f64, tempo: f64) -> Self {
        Self { valence, energy, danceability, acousticness, tempo }
    }

    /// Component-wise `self + other * weight`
    #[must_use]
    pub fn add_scaled(self, other: &Self, weight: f64) -> Self {
        Self {
            valence: self.valence + other.valence * weight,
            energy: self.energy + other.energy * weight,
            danceability: self.danceability + other.danceability * weight,
            acousticness: self.acousticness + other.acousticness * weight,
            tempo: self.tempo + other.tempo * weight,
        }
    }

    /// Component-wise division
    #[must_use]
    pub fn divide(self, divisor: f64) -> Self {
        Self {
            valence: self.valence / divisor,
            energy: self.energy / divisor,
            danceability: self.danceability / divisor,
            acousticness: self.acousticness / divisor,
            tempo: self.tempo / divisor,
        }
    }
}

/// Features of one track as returned by the feature store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatureVector {
    pub id: String,
    #[serde(flatten)]
    pub values: FeatureValues,
}

/// Batch feature lookup.
///
/// Results may be sparse: ids the store does not know are simply absent.
/// An `Err` means the lookup itself failed and nothing about the batch is
/// known. Implementations must be `Sync` because segments are resolved in
/// parallel.
pub trait FeatureStore: Sync {
    /// Resolve features for every id in `track_ids`
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be queried at all
    fn resolve(&self, track_ids: &BTreeSet<String>) -> Result<Vec<AudioFeatureVector>>;
}

/// In-memory feature store keyed by track id
#[derive(Debug, Clone, Default)]
pub struct FeatureCatalog {
    vectors: HashMap<String, FeatureValues>,
}

impl FeatureCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, values: FeatureValues) {
        self.vectors.insert(id.into(), values);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Load a JSON array of [`AudioFeatureVector`]s
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let vectors = read_vectors(path)?;
        Ok(vectors.into_iter().collect())
    }
}

impl FromIterator<AudioFeatureVector> for FeatureCatalog {
    fn from_iter<I: IntoIterator<Item = AudioFeatureVector>>(iter: I) -> Self {
        Self {
            vectors: iter.into_iter().map(|v| (v.id, v.values)).collect(),
        }
    }
}

impl FeatureStore for FeatureCatalog {
    fn resolve(&self, track_ids: &BTreeSet<String>) -> Result<Vec<AudioFeatureVector>> {
        Ok(track_ids
            .iter()
            .filter_map(|id| {
                self.vectors.get(id).map(|values| AudioFeatureVector {
                    id: id.clone(),
                    values: *values,
                })
            })
            .collect())
    }
}

/// Feature store backed by the `audio_features` table.
///
/// A connection is opened per lookup so the store can be shared across
/// rayon workers.
#[derive(Debug, Clone)]
pub struct SqliteFeatureStore {
    db_path: PathBuf,
}

impl SqliteFeatureStore {
    #[must_use]
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }
}

impl FeatureStore for SqliteFeatureStore {
    fn resolve(&self, track_ids: &BTreeSet<String>) -> Result<Vec<AudioFeatureVector>> {
        let conn = db::open_existing(&self.db_path)
            .context("Feature catalogue is unavailable")?;
        db::get_audio_features(&conn, track_ids)
    }
}

/// Read a JSON array of feature vectors
pub fn read_vectors(path: &Path) -> Result<Vec<AudioFeatureVector>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read feature file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid feature vectors in {}", path.display()))
}
