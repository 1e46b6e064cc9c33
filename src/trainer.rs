//! Segment aggregation and the training job.
//!
//! [`Aggregator::train`] turns eligible events into segment profiles and
//! merges them over a previous model. [`Trainer::run`] wraps it in the full
//! job: fetch events, lock, load, aggregate, save.
//!
//! Every segment ends in a [`SegmentOutcome`]. A segment that cannot be
//! aggregated is skipped with a reason and keeps whatever profile it had
//! before; it never aborts the run.

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;

use crate::algorithm::{WeightPolicy, WeightedCentroid};
use crate::config::RuntimeConfig;
use crate::event::{ListeningEvent, SegmentKey};
use crate::features::{FeatureStore, FeatureValues};
use crate::profile_store::{Model, ProfileStore, SegmentProfile, TrainingLock};
use crate::source::EventSource;

/// Why a segment produced no profile in this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Every track in the segment is a placeholder
    NoCatalogTracks,
    /// The feature store failed for this segment's batch
    FeatureLookupFailed(String),
    /// The lookup succeeded but none of the segment's tracks resolved
    NoResolvedFeatures,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCatalogTracks => f.write_str("no catalogue tracks"),
            Self::FeatureLookupFailed(e) => write!(f, "feature lookup failed: {e}"),
            Self::NoResolvedFeatures => f.write_str("no track resolved to features"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentOutcome {
    Trained(SegmentProfile),
    Skipped(SkipReason),
}

/// Result of aggregating one batch of events
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Previous model with this run's profiles merged in
    pub model: Model,
    /// What happened to each segment present in the batch
    pub outcomes: BTreeMap<SegmentKey, SegmentOutcome>,
}

impl TrainingReport {
    #[must_use]
    pub fn trained_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, SegmentOutcome::Trained(_)))
            .count()
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.trained_count()
    }
}

/// Partition eligible events by segment; ineligible events are dropped
#[must_use]
pub fn group_by_segment(events: &[ListeningEvent]) -> BTreeMap<SegmentKey, Vec<&ListeningEvent>> {
    let mut groups: BTreeMap<SegmentKey, Vec<&ListeningEvent>> = BTreeMap::new();
    for event in events.iter().filter(|e| e.is_eligible()) {
        groups.entry(event.segment_key()).or_default().push(event);
    }
    groups
}

/// Computes weighted feature centroids per segment
pub struct Aggregator<'a, F: FeatureStore + ?Sized> {
    features: &'a F,
    weights: WeightPolicy,
}

impl<'a, F: FeatureStore + ?Sized> Aggregator<'a, F> {
    pub fn new(features: &'a F, weights: WeightPolicy) -> Self {
        Self { features, weights }
    }

    /// Aggregate `events` and merge the resulting profiles over `prior`.
    ///
    /// Segments are resolved against the feature store in parallel, one
    /// batch per segment; merging happens afterwards in key order.
    pub fn train(&self, events: &[ListeningEvent], prior: Model) -> TrainingReport {
        let now = Utc::now();
        let segments = group_by_segment(events);

        let outcomes: BTreeMap<SegmentKey, SegmentOutcome> = segments
            .par_iter()
            .map(|(key, members)| (key.clone(), self.aggregate_segment(key, members, now)))
            .collect::<Vec<_>>()
            .into_iter()
            .collect();

        let mut model = prior;
        for (key, outcome) in &outcomes {
            match outcome {
                SegmentOutcome::Trained(profile) => {
                    info!(
                        "Updated model for {key} (n={}, weight={})",
                        profile.sample_size, profile.effective_sample_size
                    );
                    model.insert(key.clone(), profile.clone());
                }
                SegmentOutcome::Skipped(reason) => {
                    warn!("Skipping segment {key}: {reason}");
                }
            }
        }

        TrainingReport { model, outcomes }
    }

    fn aggregate_segment(&self, key: &SegmentKey, members: &[&ListeningEvent], now: DateTime<Utc>) -> SegmentOutcome {
        let catalog_ids: BTreeSet<String> = members
            .iter()
            .filter_map(|e| e.track.as_ref()?.catalog_id())
            .map(str::to_string)
            .collect();

        if catalog_ids.is_empty() {
            return SegmentOutcome::Skipped(SkipReason::NoCatalogTracks);
        }

        let resolved: HashMap<String, FeatureValues> = match self.features.resolve(&catalog_ids) {
            Ok(vectors) => vectors.into_iter().map(|v| (v.id, v.values)).collect(),
            Err(e) => {
                debug!("Feature lookup for {key} failed: {e:#}");
                return SegmentOutcome::Skipped(SkipReason::FeatureLookupFailed(format!("{e:#}")));
            }
        };

        let mut centroid = WeightedCentroid::new();
        for event in members {
            let Some(id) = event.track.as_ref().and_then(|t| t.catalog_id()) else {
                continue;
            };
            if let Some(values) = resolved.get(id) {
                centroid.add(id, *values, self.weights.weight(event.feedback));
            }
        }

        match centroid.mean() {
            Some(features) => SegmentOutcome::Trained(SegmentProfile {
                features,
                sample_size: members.len(),
                effective_sample_size: centroid.total_weight(),
                last_updated: now,
            }),
            None => SegmentOutcome::Skipped(SkipReason::NoResolvedFeatures),
        }
    }
}

/// Outcome of a full training job
#[derive(Debug)]
pub enum TrainingRun {
    /// Nothing eligible to learn from; the model was not touched
    NoEligibleEvents,
    Completed(TrainingReport),
}

/// On-demand training job: event source → aggregator → profile store
pub struct Trainer<F: FeatureStore> {
    source: EventSource,
    features: F,
    store: ProfileStore,
    lock_path: PathBuf,
    weights: WeightPolicy,
}

impl<F: FeatureStore> Trainer<F> {
    pub fn new(source: EventSource, features: F, store: ProfileStore, lock_path: PathBuf, weights: WeightPolicy) -> Self {
        Self { source, features, store, lock_path, weights }
    }

    pub fn from_config(config: &RuntimeConfig, features: F) -> Self {
        Self::new(
            EventSource::from_config(config),
            features,
            ProfileStore::new(config.model_path.clone()),
            config.lock_path.clone(),
            WeightPolicy::from(&config.training),
        )
    }

    /// Run one training pass.
    ///
    /// # Errors
    ///
    /// Fails only if another run holds the training lock or the model
    /// cannot be written. Source and feature-store problems are absorbed.
    pub fn run(&self) -> Result<TrainingRun> {
        info!("Starting model training with feedback");

        let events = self.source.fetch_eligible_events();
        if !events.iter().any(ListeningEvent::is_eligible) {
            info!("No sufficient data to train model");
            return Ok(TrainingRun::NoEligibleEvents);
        }

        let _lock = TrainingLock::acquire(&self.lock_path)?;
        let prior = self.store.load();
        let report = Aggregator::new(&self.features, self.weights).train(&events, prior);
        self.store.save(&report.model)?;

        info!(
            "Model training complete: {} segments updated, {} skipped",
            report.trained_count(),
            report.skipped_count()
        );
        Ok(TrainingRun::Completed(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Feedback, TrackRef};
    use crate::features::{AudioFeatureVector, FeatureCatalog};

    fn event(user: &str, mood: &str, age: &str, track: &str, feedback: Feedback) -> ListeningEvent {
        ListeningEvent {
            user_id: user.to_string(),
            mood: mood.to_string(),
            age_group: age.to_string(),
            track: Some(TrackRef::classify(track, "mock-")),
            feedback,
            skipped: false,
        }
    }

    fn catalog(entries: &[(&str, f64)]) -> FeatureCatalog {
        entries
            .iter()
            .map(|(id, valence)| AudioFeatureVector {
                id: (*id).to_string(),
                values: FeatureValues::new(*valence, 0.0, 0.0, 0.0, 100.0),
            })
            .collect()
    }

    /// Fails every lookup that includes `poisoned`
    struct FlakyStore {
        inner: FeatureCatalog,
        poisoned: &'static str,
    }

    impl FeatureStore for FlakyStore {
        fn resolve(&self, ids: &BTreeSet<String>) -> Result<Vec<AudioFeatureVector>> {
            if ids.contains(self.poisoned) {
                anyhow::bail!("feature service timed out");
            }
            self.inner.resolve(ids)
        }
    }

    #[test]
    fn test_like_weighted_scenario() {
        let features = catalog(&[("t1", 1.0), ("t2", 0.0)]);
        let events = vec![
            event("a", "Happy", "18-25", "t1", Feedback::Like),
            event("a", "happy", "18-25", "t2", Feedback::None),
        ];

        let report = Aggregator::new(&features, WeightPolicy::default()).train(&events, Model::new());
        let profile = report.model.get(&SegmentKey::new("a", "happy", "18-25")).unwrap();

        assert!((profile.features.valence - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(profile.features.tempo, 100.0);
        assert_eq!(profile.sample_size, 2);
        assert_eq!(profile.effective_sample_size, 3);
        assert_eq!(report.outcomes.len(), 1);
    }

    #[test]
    fn test_ineligible_events_are_ignored() {
        let features = catalog(&[("t1", 1.0), ("t2", 0.0)]);
        let mut skipped = event("a", "sad", "50+", "t2", Feedback::None);
        skipped.skipped = true;
        let events = vec![
            event("a", "sad", "50+", "t1", Feedback::None),
            event("a", "sad", "50+", "t2", Feedback::Dislike),
            skipped,
        ];

        let report = Aggregator::new(&features, WeightPolicy::default()).train(&events, Model::new());
        let profile = report.model.get(&SegmentKey::new("a", "sad", "50+")).unwrap();

        assert_eq!(profile.features.valence, 1.0);
        assert_eq!(profile.sample_size, 1);
    }

    #[test]
    fn test_placeholder_only_segment_is_skipped() {
        let features = catalog(&[("t1", 1.0)]);
        let events = vec![event("a", "calm", "13-17", "mock-1", Feedback::Like)];

        let report = Aggregator::new(&features, WeightPolicy::default()).train(&events, Model::new());

        assert!(report.model.is_empty());
        assert_eq!(
            report.outcomes[&SegmentKey::new("a", "calm", "13-17")],
            SegmentOutcome::Skipped(SkipReason::NoCatalogTracks)
        );
    }

    #[test]
    fn test_placeholders_count_toward_sample_size_only() {
        let features = catalog(&[("t1", 0.4)]);
        let events = vec![
            event("a", "calm", "13-17", "t1", Feedback::None),
            event("a", "calm", "13-17", "mock-1", Feedback::Like),
        ];

        let report = Aggregator::new(&features, WeightPolicy::default()).train(&events, Model::new());
        let profile = report.model.get(&SegmentKey::new("a", "calm", "13-17")).unwrap();

        assert_eq!(profile.sample_size, 2);
        assert_eq!(profile.effective_sample_size, 1);
        assert_eq!(profile.features.valence, 0.4);
    }

    #[test]
    fn test_unresolved_catalog_track_counts_toward_sample_size_only() {
        let features = catalog(&[("t1", 0.4)]);
        let events = vec![
            event("a", "sad", "36-50", "t1", Feedback::None),
            event("a", "sad", "36-50", "ghost", Feedback::Like),
        ];

        let report = Aggregator::new(&features, WeightPolicy::default()).train(&events, Model::new());
        let key = SegmentKey::new("a", "sad", "36-50");
        let profile = report.model.get(&key).unwrap();

        assert_eq!(profile.sample_size, 2);
        assert_eq!(profile.effective_sample_size, 1);
        assert_eq!(profile.features.valence, 0.4);
        assert!(matches!(report.outcomes[&key], SegmentOutcome::Trained(_)));
    }

    #[test]
    fn test_unresolved_tracks_keep_prior_profile() {
        let features = catalog(&[]);
        let key = SegmentKey::new("a", "happy", "26-35");
        let prior_profile = SegmentProfile {
            features: FeatureValues::new(0.9, 0.9, 0.9, 0.9, 140.0),
            sample_size: 4,
            effective_sample_size: 5,
            last_updated: Utc::now(),
        };
        let mut prior = Model::new();
        prior.insert(key.clone(), prior_profile.clone());

        let events = vec![event("a", "happy", "26-35", "ghost", Feedback::Like)];
        let report = Aggregator::new(&features, WeightPolicy::default()).train(&events, prior);

        assert_eq!(report.model.get(&key), Some(&prior_profile));
        assert_eq!(report.outcomes[&key], SegmentOutcome::Skipped(SkipReason::NoResolvedFeatures));
    }

    #[test]
    fn test_segments_absent_from_batch_are_untouched() {
        let features = catalog(&[("t1", 0.5)]);
        let untouched = SegmentKey::new("z", "sad", "50+");
        let mut prior = Model::new();
        prior.insert(untouched.clone(), SegmentProfile {
            features: FeatureValues::default(),
            sample_size: 1,
            effective_sample_size: 1,
            last_updated: Utc::now(),
        });

        let events = vec![event("a", "calm", "18-25", "t1", Feedback::None)];
        let report = Aggregator::new(&features, WeightPolicy::default()).train(&events, prior);

        assert_eq!(report.model.len(), 2);
        assert!(report.model.contains(&untouched));
        assert!(!report.outcomes.contains_key(&untouched));
    }

    #[test]
    fn test_feature_failure_is_segment_local() {
        let store = FlakyStore {
            inner: catalog(&[("t1", 0.8), ("t2", 0.2), ("bad", 0.5)]),
            poisoned: "bad",
        };
        let events = vec![
            event("a", "happy", "18-25", "t1", Feedback::None),
            event("b", "sad", "26-35", "bad", Feedback::None),
            event("b", "sad", "26-35", "t2", Feedback::Like),
            event("c", "calm", "36-50", "t2", Feedback::None),
        ];

        let report = Aggregator::new(&store, WeightPolicy::default()).train(&events, Model::new());
        let failed = SegmentKey::new("b", "sad", "26-35");

        assert!(report.model.get(&failed).is_none());
        assert!(matches!(
            report.outcomes[&failed],
            SegmentOutcome::Skipped(SkipReason::FeatureLookupFailed(_))
        ));
        assert!(report.model.contains(&SegmentKey::new("a", "happy", "18-25")));
        assert!(report.model.contains(&SegmentKey::new("c", "calm", "36-50")));
        assert_eq!(report.trained_count(), 2);
        assert_eq!(report.skipped_count(), 1);
    }

    #[test]
    fn test_reordering_events_gives_identical_profile() {
        let features = catalog(&[("t1", 0.137), ("t2", 0.911), ("t3", 0.443)]);
        let events = vec![
            event("a", "happy", "18-25", "t1", Feedback::Like),
            event("a", "happy", "18-25", "t2", Feedback::None),
            event("a", "happy", "18-25", "t3", Feedback::Like),
            event("a", "happy", "18-25", "t1", Feedback::None),
        ];
        let mut reversed = events.clone();
        reversed.reverse();

        let aggregator = Aggregator::new(&features, WeightPolicy::default());
        let key = SegmentKey::new("a", "happy", "18-25");
        let forward = aggregator.train(&events, Model::new()).model.get(&key).cloned().unwrap();
        let backward = aggregator.train(&reversed, Model::new()).model.get(&key).cloned().unwrap();

        assert_eq!(forward.features, backward.features);
        assert_eq!(forward.effective_sample_size, backward.effective_sample_size);
    }

    #[test]
    fn test_all_likes_equal_unweighted_mean() {
        let features = catalog(&[("t1", 0.2), ("t2", 0.6)]);
        let events = vec![
            event("a", "calm", "50+", "t1", Feedback::Like),
            event("a", "calm", "50+", "t2", Feedback::Like),
        ];

        let report = Aggregator::new(&features, WeightPolicy::default()).train(&events, Model::new());
        let profile = report.model.get(&SegmentKey::new("a", "calm", "50+")).unwrap();

        assert!((profile.features.valence - 0.4).abs() < 1e-12);
        assert_eq!(profile.effective_sample_size, 4);
    }

    #[test]
    fn test_all_neutral_resolved_sizes_match() {
        let features = catalog(&[("t1", 0.2), ("t2", 0.6), ("t3", 0.1)]);
        let events = vec![
            event("a", "sad", "18-25", "t1", Feedback::None),
            event("a", "sad", "18-25", "t2", Feedback::None),
            event("a", "sad", "18-25", "t3", Feedback::None),
        ];

        let report = Aggregator::new(&features, WeightPolicy::default()).train(&events, Model::new());
        let profile = report.model.get(&SegmentKey::new("a", "sad", "18-25")).unwrap();

        assert_eq!(profile.effective_sample_size as usize, profile.sample_size);
    }

    #[test]
    fn test_grouping_preserves_eligible_events() {
        let disliked = event("b", "sad", "50+", "t9", Feedback::Dislike);
        let events = vec![
            event("a", "Happy", "18-25", "t1", Feedback::None),
            event("a", "happy", "18-25", "t2", Feedback::Like),
            event("b", "calm", "18-25", "t1", Feedback::None),
            disliked,
        ];

        let groups = group_by_segment(&events);
        let regrouped: usize = groups.values().map(Vec::len).sum();

        assert_eq!(groups.len(), 2);
        assert_eq!(regrouped, 3);
        assert_eq!(groups[&SegmentKey::new("a", "happy", "18-25")].len(), 2);
    }
}
