//! Listening events and the segment keys they are learned under.
//!
//! Raw records arrive from the primary store or the local snapshot as
//! [`EventRecord`]s with every field optional. Ingestion turns them into
//! [`ListeningEvent`]s: defaults are filled in and track ids are classified
//! as real catalogue ids or synthetic placeholders once, up front.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User id assigned to events recorded without one
pub const GUEST_USER: &str = "guest";

/// Mood or age-group label assigned when the record carries none
pub const UNKNOWN_LABEL: &str = "unknown";

/// Explicit listener feedback on a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Like,
    Dislike,
    #[default]
    None,
}

impl Feedback {
    /// Lenient conversion from a stored label. Anything that is not exactly
    /// `like` or `dislike` counts as no feedback.
    #[must_use]
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("like") => Self::Like,
            Some("dislike") => Self::Dislike,
            _ => Self::None,
        }
    }

    /// Label stored in the event table, `None` for neutral feedback
    #[must_use]
    pub fn as_label(self) -> Option<&'static str> {
        match self {
            Self::Like => Some("like"),
            Self::Dislike => Some("dislike"),
            Self::None => None,
        }
    }
}

impl FromStr for Feedback {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "like" => Ok(Self::Like),
            "dislike" => Ok(Self::Dislike),
            "none" | "" => Ok(Self::None),
            other => anyhow::bail!("Unknown feedback: {other}. Use 'like', 'dislike' or 'none'"),
        }
    }
}

/// Reference from an event to a track
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrackRef {
    /// Id known to the feature store
    Catalog(String),
    /// Synthetic id that must never be sent to the feature store
    Placeholder(String),
}

impl TrackRef {
    /// Classify a raw track id using the configured placeholder prefix
    #[must_use]
    pub fn classify(id: &str, placeholder_prefix: &str) -> Self {
        if !placeholder_prefix.is_empty() && id.starts_with(placeholder_prefix) {
            Self::Placeholder(id.to_string())
        } else {
            Self::Catalog(id.to_string())
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Catalog(id) | Self::Placeholder(id) => id,
        }
    }

    /// The id if it can be resolved against the feature store
    #[must_use]
    pub fn catalog_id(&self) -> Option<&str> {
        match self {
            Self::Catalog(id) => Some(id),
            Self::Placeholder(_) => None,
        }
    }
}

/// Composite `(user, mood, age group)` key profiles are learned under.
///
/// Serialized as `"{user_id}|{mood_lowercased}|{age_group}"`. The same string
/// is used to write and to read profiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentKey(String);

impl SegmentKey {
    #[must_use]
    pub fn new(user_id: &str, mood: &str, age_group: &str) -> Self {
        Self(format!("{user_id}|{}|{age_group}", mood.to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One listening event after ingestion
#[derive(Debug, Clone, PartialEq)]
pub struct ListeningEvent {
    pub user_id: String,
    pub mood: String,
    pub age_group: String,
    pub track: Option<TrackRef>,
    pub feedback: Feedback,
    pub skipped: bool,
}

impl ListeningEvent {
    /// Whether the event may contribute to training: it references a track,
    /// was not skipped and was not disliked.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.track.is_some() && !self.skipped && self.feedback != Feedback::Dislike
    }

    #[must_use]
    pub fn segment_key(&self) -> SegmentKey {
        SegmentKey::new(&self.user_id, &self.mood, &self.age_group)
    }
}

/// Listening event as stored, with every field optional.
///
/// This is the shape of the local snapshot file and of rows read from the
/// primary store. Display metadata (`track_name`, `artist_name`, `image_url`)
/// and `source` are only used by snapshot recommendations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventRecord {
    pub user_id: Option<String>,
    pub mood: Option<String>,
    pub age_group: Option<String>,
    pub spotify_id: Option<String>,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub image_url: Option<String>,
    pub feedback: Option<String>,
    pub skipped: Option<bool>,
    pub source: Option<String>,
    pub created_at: Option<String>,
}

impl EventRecord {
    /// Track id if present and non-empty
    #[must_use]
    pub fn track_id(&self) -> Option<&str> {
        self.spotify_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Same predicate the primary store applies in SQL
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.track_id().is_some()
            && self.skipped != Some(true)
            && self.feedback.as_deref() != Some("dislike")
    }

    /// Fill in defaults and classify the track reference
    #[must_use]
    pub fn to_event(&self, placeholder_prefix: &str) -> ListeningEvent {
        ListeningEvent {
            user_id: non_empty_or(self.user_id.as_deref(), GUEST_USER),
            mood: non_empty_or(self.mood.as_deref(), UNKNOWN_LABEL),
            age_group: non_empty_or(self.age_group.as_deref(), UNKNOWN_LABEL),
            track: self.track_id().map(|id| TrackRef::classify(id, placeholder_prefix)),
            feedback: Feedback::from_label(self.feedback.as_deref()),
            skipped: self.skipped == Some(true),
        }
    }
}

fn non_empty_or(value: Option<&str>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}
