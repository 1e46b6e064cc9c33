//! Mood vocabulary and per-mood baseline feature targets.
//!
//! Baselines are what a track of a given mood is expected to sound like.
//! They stand in for a learned profile when a segment has never been
//! trained, and seed synthetic feature data.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::features::{AudioFeatureVector, FeatureValues};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Sad,
    Calm,
    Energetic,
    Stressed,
}

impl Mood {
    pub const ALL: [Mood; 5] = [Mood::Happy, Mood::Sad, Mood::Calm, Mood::Energetic, Mood::Stressed];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Calm => "calm",
            Mood::Energetic => "energetic",
            Mood::Stressed => "stressed",
        }
    }

    /// Expected feature profile for tracks of this mood
    #[must_use]
    pub fn baseline(self) -> FeatureValues {
        match self {
            Mood::Happy => FeatureValues::new(0.8, 0.75, 0.85, 0.15, 120.0),
            Mood::Energetic => FeatureValues::new(0.85, 0.85, 0.8, 0.1, 130.0),
            Mood::Calm => FeatureValues::new(0.3, 0.2, 0.3, 0.7, 70.0),
            Mood::Sad => FeatureValues::new(0.2, 0.25, 0.25, 0.8, 60.0),
            Mood::Stressed => FeatureValues::new(0.35, 0.3, 0.4, 0.6, 75.0),
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        Mood::ALL
            .into_iter()
            .find(|mood| mood.as_str() == lowered)
            .ok_or_else(|| anyhow::anyhow!("Unknown mood: {s}"))
    }
}

/// Baseline for a free-form mood label; unknown moods get the happy baseline
#[must_use]
pub fn baseline_for(mood: &str) -> FeatureValues {
    mood.parse::<Mood>().unwrap_or(Mood::Happy).baseline()
}

/// Generate `count` synthetic feature sets scattered around a mood's baseline.
///
/// Bounded dimensions move by up to ±0.1 and stay in `[0, 1]`; tempo moves by
/// up to ±10 BPM and never drops below 50.
pub fn sample_mock_features<R: Rng + ?Sized>(mood: &str, count: usize, rng: &mut R) -> Vec<FeatureValues> {
    let base = baseline_for(mood);
    let mut samples = Vec::with_capacity(count);

    for _ in 0..count {
        samples.push(FeatureValues {
            valence: jitter_unit(base.valence, rng),
            energy: jitter_unit(base.energy, rng),
            danceability: jitter_unit(base.danceability, rng),
            acousticness: jitter_unit(base.acousticness, rng),
            tempo: (base.tempo + rng.gen_range(-10.0..10.0)).max(50.0),
        });
    }

    samples
}

/// Synthetic catalogue entries for `track_ids`, one mock sample per track.
///
/// Used to seed the local feature catalogue for tracks that have no real
/// analysis yet, so segments listening to them can still be trained.
pub fn synthetic_vectors<R: Rng + ?Sized>(mood: &str, track_ids: &[String], rng: &mut R) -> Vec<AudioFeatureVector> {
    sample_mock_features(mood, track_ids.len(), rng)
        .into_iter()
        .zip(track_ids)
        .map(|(values, id)| AudioFeatureVector { id: id.clone(), values })
        .collect()
}

fn jitter_unit<R: Rng + ?Sized>(value: f64, rng: &mut R) -> f64 {
    (value + rng.gen_range(-0.1..0.1)).clamp(0.0, 1.0)
}
