//! Serving-time lookups against the learned model.
//!
//! The model is loaded from disk on every query; nothing is cached between
//! calls, so a finished training run is visible immediately.

use serde::Serialize;

use crate::config::RuntimeConfig;
use crate::event::SegmentKey;
use crate::features::FeatureValues;
use crate::mood::baseline_for;
use crate::profile_store::{ProfileStore, SegmentProfile};

/// Where a feature target came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSource {
    /// Learned profile of the requested segment
    Learned,
    /// Fixed baseline of the requested mood
    MoodBaseline,
}

/// Feature profile to aim recommendations at
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub segment: SegmentKey,
    pub source: TargetSource,
    #[serde(flatten)]
    pub features: FeatureValues,
}

#[derive(Debug, Clone)]
pub struct Predictor {
    store: ProfileStore,
}

impl Predictor {
    #[must_use]
    pub fn new(store: ProfileStore) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(ProfileStore::new(config.model_path.clone()))
    }

    /// Learned profile for the segment, or `None` if it was never trained
    #[must_use]
    pub fn predict(&self, user_id: &str, mood: &str, age_group: &str) -> Option<SegmentProfile> {
        let key = SegmentKey::new(user_id, mood, age_group);
        self.store.load().get(&key).cloned()
    }

    /// Learned profile if there is one, otherwise the mood's baseline
    #[must_use]
    pub fn target(&self, user_id: &str, mood: &str, age_group: &str) -> Target {
        let segment = SegmentKey::new(user_id, mood, age_group);
        match self.predict(user_id, mood, age_group) {
            Some(profile) => Target {
                segment,
                source: TargetSource::Learned,
                features: profile.features,
            },
            None => Target {
                segment,
                source: TargetSource::MoodBaseline,
                features: baseline_for(mood),
            },
        }
    }
}
