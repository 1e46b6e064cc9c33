//! Weighting policy and weighted centroids.
//!
//! Each eligible event contributes its track's feature vector with an
//! integer weight: explicit likes count more than everything else.
//!
//! ```text
//! mean_d = Σ(feature_d(track_i) * weight_i) / Σ(weight_i)
//! ```
//!
//! Contributions are keyed by track id and folded in key order, so the
//! result does not depend on the order events arrived in, down to the bit.

use std::collections::BTreeMap;

use crate::config::TrainingConfig;
use crate::event::Feedback;
use crate::features::FeatureValues;

/// Integer weight per feedback kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightPolicy {
    pub like: u32,
    pub neutral: u32,
}

impl Default for WeightPolicy {
    fn default() -> Self {
        Self { like: 2, neutral: 1 }
    }
}

impl From<&TrainingConfig> for WeightPolicy {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            like: config.like_weight,
            neutral: config.neutral_weight,
        }
    }
}

impl WeightPolicy {
    /// Weight of one event. Dislikes never reach training, so they share
    /// the neutral weight here.
    #[must_use]
    pub fn weight(&self, feedback: Feedback) -> u32 {
        match feedback {
            Feedback::Like => self.like,
            Feedback::Dislike | Feedback::None => self.neutral,
        }
    }
}

/// Order-independent accumulator for a weighted mean over tracks
#[derive(Debug, Clone, Default)]
pub struct WeightedCentroid<'a> {
    weights: BTreeMap<&'a str, (FeatureValues, u64)>,
}

impl<'a> WeightedCentroid<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one contribution of `values` for `track_id`
    pub fn add(&mut self, track_id: &'a str, values: FeatureValues, weight: u32) {
        self.weights
            .entry(track_id)
            .and_modify(|(_, total)| *total += u64::from(weight))
            .or_insert((values, u64::from(weight)));
    }

    #[must_use]
    pub fn total_weight(&self) -> u64 {
        self.weights.values().map(|(_, w)| *w).sum()
    }

    /// Weighted mean, or `None` if nothing with positive weight was added
    #[must_use]
    pub fn mean(&self) -> Option<FeatureValues> {
        let total = self.total_weight();
        if total == 0 {
            return None;
        }

        let sum = self
            .weights
            .values()
            .fold(FeatureValues::default(), |acc, (values, weight)| {
                acc.add_scaled(values, *weight as f64)
            });

        Some(sum.divide(total as f64))
    }
}
