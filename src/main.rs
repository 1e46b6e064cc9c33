//! # Moodmix
//!
//! Learns which audio-feature profile each listener wants for a given mood
//! and age group, and serves those profiles back at recommendation time.
//!
//! ## Usage
//!
//! ```bash
//! # Load data
//! moodmix import-features features.json
//! moodmix import-snapshot
//!
//! # Learn and query
//! moodmix train
//! moodmix target ana calm 26-35
//! moodmix activity calm 26-35
//!
//! # Snapshot picks when the live path is down
//! moodmix recommend calm --count 5
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{info, warn};
use serde::Serialize;

use moodmix::cli::{self, Command};
use moodmix::config::{self, RuntimeConfig};
use moodmix::event::{EventRecord, Feedback};
use moodmix::fallback::FallbackRecommender;
use moodmix::features::{self, FeatureCatalog, SqliteFeatureStore};
use moodmix::predictor::Predictor;
use moodmix::trainer::{SegmentOutcome, Trainer, TrainingReport, TrainingRun};
use moodmix::{activity, completion, db, mood, snapshot};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_report(report: &TrainingReport) {
    for (key, outcome) in &report.outcomes {
        match outcome {
            SegmentOutcome::Trained(profile) => println!(
                "updated  {key}  n={} weight={}",
                profile.sample_size, profile.effective_sample_size
            ),
            SegmentOutcome::Skipped(reason) => println!("skipped  {key}  {reason}"),
        }
    }
    println!(
        "{} segments updated, {} skipped, {} profiles in model",
        report.trained_count(),
        report.skipped_count(),
        report.model.len()
    );
}

fn run_training(config: &RuntimeConfig, features_file: Option<&std::path::Path>) -> Result<TrainingRun> {
    match features_file {
        Some(path) => {
            let catalog = FeatureCatalog::from_json_file(path)?;
            info!("Resolving features from {} ({} tracks)", path.display(), catalog.len());
            Trainer::from_config(config, catalog).run()
        }
        None => {
            let store = SqliteFeatureStore::new(config.events_db_path.clone());
            Trainer::from_config(config, store).run()
        }
    }
}

/// Main entry point.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=info moodmix train` - Per-segment training progress
/// - `RUST_LOG=moodmix::source=debug moodmix train` - Module-specific logging
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    if let Command::Completion { shell } = args.command {
        let mut cmd = cli::Args::command();
        completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        return Ok(());
    }
    if let Command::CompleteMoods = args.command {
        completion::print_mood_completions();
        return Ok(());
    }

    let config = match args.data_dir {
        Some(dir) => RuntimeConfig::load(dir)?,
        None => RuntimeConfig::load(config::get_data_dir()?)?,
    };

    match args.command {
        Command::Train { features } => match run_training(&config, features.as_deref())? {
            TrainingRun::NoEligibleEvents => println!("No eligible listening events; model left unchanged"),
            TrainingRun::Completed(report) => print_report(&report),
        },
        Command::Predict { user, mood, age_group } => {
            let profile = Predictor::from_config(&config).predict(&user, &mood, &age_group);
            if profile.is_none() {
                warn!("No learned profile for {user}|{}|{age_group}", mood.to_lowercase());
            }
            print_json(&profile)?;
        }
        Command::Target { user, mood, age_group } => {
            print_json(&Predictor::from_config(&config).target(&user, &mood, &age_group))?;
        }
        Command::Recommend { mood, count, exclude } => {
            let count = count.unwrap_or(config.fallback.default_count);
            let tracks = FallbackRecommender::from_config(&config).recommend(&mood, count, &exclude);
            print_json(&tracks)?;
        }
        Command::Log {
            user,
            mood,
            age_group,
            track,
            track_name,
            artist,
            image_url,
            feedback,
            skipped,
            source,
        } => {
            let record = EventRecord {
                user_id: user,
                mood: Some(mood),
                age_group,
                spotify_id: Some(track),
                track_name,
                artist_name: artist,
                image_url,
                feedback: feedback
                    .map(Feedback::from)
                    .and_then(Feedback::as_label)
                    .map(str::to_string),
                skipped: Some(skipped),
                source,
                created_at: None,
            };
            let conn = db::open(&config.events_db_path)?;
            let id = db::record_event(&conn, &record)?;
            info!("Recorded listening event {id}");
        }
        Command::Feedback { user, track, feedback } => {
            let conn = db::open(&config.events_db_path)?;
            if db::set_feedback(&conn, &user, &track, feedback.into())? {
                println!("Feedback recorded");
            } else {
                anyhow::bail!("No listening event for user {user} and track {track}");
            }
        }
        Command::Skip { user, track } => {
            let conn = db::open(&config.events_db_path)?;
            if db::mark_skipped(&conn, &user, &track)? {
                println!("Skip recorded");
            } else {
                anyhow::bail!("No listening event for user {user} and track {track}");
            }
        }
        Command::History { user } => {
            let conn = db::open(&config.events_db_path)?;
            print_json(&db::history(&conn, &user)?)?;
        }
        Command::ImportSnapshot { path } => {
            let path = path.unwrap_or_else(|| config.snapshot_path.clone());
            let records = snapshot::load_records(&path);
            let mut conn = db::open(&config.events_db_path)?;
            let imported = db::import_records(&mut conn, &records)?;
            println!("Imported {imported} events from {}", path.display());
        }
        Command::ImportFeatures { path } => {
            let vectors = features::read_vectors(&path)?;
            let mut conn = db::open(&config.events_db_path)?;
            let stored = db::upsert_audio_features(&mut conn, &vectors)
                .with_context(|| format!("Failed to import features from {}", path.display()))?;
            println!("Stored {stored} feature vectors");
        }
        Command::SeedFeatures { mood: mood_label, tracks } => {
            let vectors = mood::synthetic_vectors(&mood_label, &tracks, &mut rand::thread_rng());
            let mut conn = db::open(&config.events_db_path)?;
            let stored = db::upsert_audio_features(&mut conn, &vectors)?;
            println!("Stored {stored} synthetic feature vectors");
        }
        Command::Activity { mood: mood_label, age_group } => {
            println!("{}", activity::suggest(&mood_label, &age_group));
        }
        Command::Completion { .. } | Command::CompleteMoods => {}
    }

    Ok(())
}
