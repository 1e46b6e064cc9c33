//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `moodmix` binary.
//!
//! ## Commands
//!
//! - `train`: Learn segment profiles from the event history
//! - `predict` / `target`: Look up what a segment should be served
//! - `recommend`: Pick tracks straight from the local snapshot
//! - `log`, `feedback`, `skip`, `history`: Maintain the event history
//! - `import-snapshot`, `import-features`, `seed-features`: Load local data into the store
//! - `activity`: Suggest something to do for a mood and age group
//!
//! ## Examples
//!
//! ```bash
//! moodmix log --user ana --mood happy --age-group 18-25 --track 4uLU6hMC --feedback like
//! moodmix train
//! moodmix predict ana happy 18-25
//! moodmix recommend calm --count 3 --exclude 4uLU6hMC
//! moodmix activity stressed 26-35
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::event::Feedback;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Feedback values accepted on the command line
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum FeedbackArg {
    Like,
    Dislike,
    None,
}

impl From<FeedbackArg> for Feedback {
    fn from(arg: FeedbackArg) -> Self {
        match arg {
            FeedbackArg::Like => Feedback::Like,
            FeedbackArg::Dislike => Feedback::Dislike,
            FeedbackArg::None => Feedback::None,
        }
    }
}

/// Main application arguments structure.
#[derive(Parser)]
#[command(name = "moodmix")]
#[command(about = "Moodmix: mood and age-group aware track targets learned from listening feedback")]
#[command(version)]
pub struct Args {
    /// Directory holding the event store, snapshot and model
    ///
    /// Defaults to the platform data directory (e.g. ~/.local/share/moodmix).
    #[arg(long, global = true, env = "MOODMIX_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Learn segment profiles from the listening history
    ///
    /// Reads eligible events from the event store (or the local snapshot if
    /// the store is unavailable), resolves track features and merges new
    /// profiles into the model. Segments not seen in this run keep their
    /// previous profile.
    Train {
        /// Resolve features from this JSON file instead of the local catalogue
        #[arg(long)]
        features: Option<PathBuf>,
    },

    /// Print the learned profile of a segment, or null if never trained
    Predict {
        user: String,
        mood: String,
        age_group: String,
    },

    /// Print the feature target for a segment, falling back to the mood baseline
    Target {
        user: String,
        mood: String,
        age_group: String,
    },

    /// Recommend tracks straight from the local snapshot
    Recommend {
        mood: String,

        /// Maximum number of tracks
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Track id that must not be recommended (repeatable)
        #[arg(long = "exclude")]
        exclude: Vec<String>,
    },

    /// Record one listening event
    Log {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        mood: String,
        #[arg(long)]
        age_group: Option<String>,
        #[arg(long)]
        track: String,
        #[arg(long)]
        track_name: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
        #[arg(long, value_enum)]
        feedback: Option<FeedbackArg>,
        #[arg(long)]
        skipped: bool,
        /// Origin tag, e.g. "dataset" for curated entries
        #[arg(long)]
        source: Option<String>,
    },

    /// Set feedback on the user's latest event for a track
    Feedback {
        user: String,
        track: String,
        #[arg(value_enum)]
        feedback: FeedbackArg,
    },

    /// Mark the user's latest event for a track as skipped
    Skip {
        user: String,
        track: String,
    },

    /// Show a user's listening history, newest first
    History {
        user: String,
    },

    /// Copy the local snapshot (or another snapshot file) into the event store
    ImportSnapshot {
        path: Option<PathBuf>,
    },

    /// Load a JSON array of audio feature vectors into the local catalogue
    ImportFeatures {
        path: PathBuf,
    },

    /// Store synthetic feature vectors around a mood's baseline for the given tracks
    ///
    /// Useful for tracks that have no real analysis yet. Existing vectors for
    /// the same ids are replaced.
    SeedFeatures {
        mood: String,
        #[arg(required = true)]
        tracks: Vec<String>,
    },

    /// Suggest an activity for a mood, tailored to the age group when possible
    Activity {
        mood: String,
        age_group: String,
    },

    /// Generate shell completions
    ///
    /// Usage: moodmix completion bash > ~/.local/share/bash-completion/completions/moodmix
    Completion {
        shell: Shell,
    },

    /// List known moods for completion (hidden command)
    #[command(hide = true)]
    CompleteMoods,
}
