//! Snapshot-based recommendations that bypass the learned model.
//!
//! Used when the live recommendation path is unavailable. Candidates are
//! curated snapshot entries for the requested mood that carry a track name;
//! excluded ids are removed, the rest shuffled uniformly and truncated.

use log::debug;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::RuntimeConfig;
use crate::event::EventRecord;
use crate::snapshot;

/// Display-ready track
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackSummary {
    pub id: String,
    pub name: String,
    pub artist: Option<String>,
    pub image_url: Option<String>,
    /// Snapshot entries never carry audio previews
    pub preview_url: Option<String>,
    pub external_url: String,
}

impl TrackSummary {
    fn from_record(id: &str, name: &str, record: &EventRecord) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            artist: record.artist_name.clone(),
            image_url: record.image_url.clone(),
            preview_url: None,
            external_url: format!("https://open.spotify.com/track/{id}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FallbackRecommender {
    snapshot_path: PathBuf,
    curated_source: String,
}

impl FallbackRecommender {
    #[must_use]
    pub fn new(snapshot_path: PathBuf, curated_source: impl Into<String>) -> Self {
        Self {
            snapshot_path,
            curated_source: curated_source.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.snapshot_path.clone(), config.fallback.curated_source.clone())
    }

    /// Up to `count` random curated tracks for `mood`, never including an
    /// id from `excluded_track_ids`
    #[must_use]
    pub fn recommend(&self, mood: &str, count: usize, excluded_track_ids: &[String]) -> Vec<TrackSummary> {
        self.recommend_with_rng(mood, count, excluded_track_ids, &mut thread_rng())
    }

    /// [`recommend`](Self::recommend) with a caller-supplied random source
    pub fn recommend_with_rng<R: Rng + ?Sized>(
        &self,
        mood: &str,
        count: usize,
        excluded_track_ids: &[String],
        rng: &mut R,
    ) -> Vec<TrackSummary> {
        let records = snapshot::load_records(&self.snapshot_path);
        let mut candidates = self.candidates(&records, mood, excluded_track_ids);
        debug!("{} fallback candidates for mood {mood}", candidates.len());

        candidates.shuffle(rng);
        candidates.truncate(count);
        candidates
    }

    fn candidates(&self, records: &[EventRecord], mood: &str, excluded_track_ids: &[String]) -> Vec<TrackSummary> {
        let mood = mood.to_lowercase();
        let excluded: HashSet<&str> = excluded_track_ids.iter().map(String::as_str).collect();

        records
            .iter()
            .filter(|r| r.mood.as_deref().is_some_and(|m| m.to_lowercase() == mood))
            .filter(|r| r.source.as_deref() == Some(self.curated_source.as_str()))
            .filter_map(|r| {
                let name = r.track_name.as_deref().filter(|n| !n.is_empty())?;
                let id = r.track_id()?;
                (!excluded.contains(id)).then(|| TrackSummary::from_record(id, name, r))
            })
            .collect()
    }
}
