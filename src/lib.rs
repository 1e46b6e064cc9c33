//! Mood-aware listening preference learning.
//!
//! Moodmix learns, per listener segment `(user, mood, age group)`, the audio
//! feature profile they respond to, and hands that profile back when it is
//! time to recommend.
//!
//! Core modules:
//! - [`trainer`] - Segment aggregation and the training job
//! - [`algorithm`] - Feedback weighting and weighted centroids
//! - [`profile_store`] - Model persistence and the training lock
//! - [`predictor`] - Serving-time profile lookups
//! - [`fallback`] - Snapshot recommendations that bypass the model
//!
//! ### Supporting Modules
//!
//! - [`event`] - Listening events, feedback and segment keys
//! - [`features`] - Audio feature vectors and feature stores
//! - [`mood`] - Mood vocabulary and baselines
//! - [`activity`] - Activity suggestions per mood and age group
//! - [`source`] - Event source with snapshot fallback
//! - [`db`] - SQLite event log and feature catalogue
//! - [`snapshot`] - Local JSON snapshot
//! - [`config`] - Data directory and runtime settings
//! - [`cli`] / [`completion`] - Command-line interface
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use moodmix::config::RuntimeConfig;
//! use moodmix::features::SqliteFeatureStore;
//! use moodmix::predictor::Predictor;
//! use moodmix::trainer::{Trainer, TrainingRun};
//!
//! let config = RuntimeConfig::new()?;
//!
//! let features = SqliteFeatureStore::new(config.events_db_path.clone());
//! if let TrainingRun::Completed(report) = Trainer::from_config(&config, features).run()? {
//!     println!("{} segments updated", report.trained_count());
//! }
//!
//! match Predictor::from_config(&config).predict("ana", "Happy", "18-25") {
//!     Some(profile) => println!("target valence {:.3}", profile.features.valence),
//!     None => println!("no personalised target yet"),
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Public functions return `anyhow::Result` where a caller can act on the
//! failure. Unavailable sources, empty results and malformed persisted state
//! are not errors: they come back as empty lists, `None`, an empty model or a
//! skipped segment, and are logged through the `log` facade.

pub mod activity;
pub mod algorithm;
pub mod cli;
pub mod completion;
pub mod config;
pub mod db;
pub mod event;
pub mod fallback;
pub mod features;
pub mod mood;
pub mod predictor;
pub mod profile_store;
pub mod snapshot;
pub mod source;
pub mod trainer;
