//! # Integration Tests for Moodmix
//!
//! End-to-end workflows through the public API and the binary: recording
//! events, training against the SQLite catalogue, predicting, and the
//! snapshot fallbacks.

use anyhow::Result;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

use moodmix::config::RuntimeConfig;
use moodmix::db;
use moodmix::event::{EventRecord, SegmentKey};
use moodmix::features::{AudioFeatureVector, FeatureCatalog, FeatureValues, SqliteFeatureStore};
use moodmix::predictor::{Predictor, TargetSource};
use moodmix::profile_store::ProfileStore;
use moodmix::source::{EventOrigin, EventSource};
use moodmix::trainer::{SegmentOutcome, SkipReason, Trainer, TrainingRun};

fn record(user: &str, mood: &str, age: &str, track: &str, feedback: Option<&str>) -> EventRecord {
    EventRecord {
        user_id: Some(user.to_string()),
        mood: Some(mood.to_string()),
        age_group: Some(age.to_string()),
        spotify_id: Some(track.to_string()),
        feedback: feedback.map(str::to_string),
        ..Default::default()
    }
}

fn vector(id: &str, valence: f64, energy: f64) -> AudioFeatureVector {
    AudioFeatureVector {
        id: id.to_string(),
        values: FeatureValues::new(valence, energy, 0.5, 0.2, 100.0),
    }
}

/// Data directory with a populated event store and feature catalogue
fn seeded_config() -> Result<(TempDir, RuntimeConfig)> {
    let temp_dir = TempDir::new()?;
    let config = RuntimeConfig::load(temp_dir.path().to_path_buf())?;

    let mut conn = db::open(&config.events_db_path)?;
    db::import_records(&mut conn, &[
        record("a", "Happy", "18-25", "t1", Some("like")),
        record("a", "happy", "18-25", "t2", None),
        record("a", "happy", "18-25", "t3", Some("dislike")),
        record("b", "sad", "26-35", "t4", None),
        record("b", "sad", "26-35", "mock-7", Some("like")),
        record("c", "calm", "50+", "mock-1", None),
    ])?;
    db::upsert_audio_features(&mut conn, &[
        vector("t1", 1.0, 0.8),
        vector("t2", 0.0, 0.2),
        vector("t3", 0.5, 0.5),
        vector("t4", 0.3, 0.1),
    ])?;

    Ok((temp_dir, config))
}

fn sqlite_trainer(config: &RuntimeConfig) -> Trainer<SqliteFeatureStore> {
    Trainer::from_config(config, SqliteFeatureStore::new(config.events_db_path.clone()))
}

fn model_without_timestamps(path: &Path) -> Result<serde_json::Value> {
    let mut value: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    if let Some(profiles) = value.as_object_mut() {
        for profile in profiles.values_mut() {
            if let Some(fields) = profile.as_object_mut() {
                fields.remove("lastUpdated");
            }
        }
    }
    Ok(value)
}

#[cfg(test)]
mod training_tests {
    use super::*;

    #[test]
    fn test_train_then_predict() -> Result<()> {
        let (_temp_dir, config) = seeded_config()?;

        let run = sqlite_trainer(&config).run()?;
        let TrainingRun::Completed(report) = run else {
            panic!("expected a completed run");
        };
        assert_eq!(report.trained_count(), 2);
        assert_eq!(
            report.outcomes[&SegmentKey::new("c", "calm", "50+")],
            SegmentOutcome::Skipped(SkipReason::NoCatalogTracks)
        );

        let predictor = Predictor::from_config(&config);
        let happy = predictor.predict("a", "HAPPY", "18-25").expect("segment was trained");
        assert!((happy.features.valence - 2.0 / 3.0).abs() < 1e-9);
        assert!((happy.features.energy - 0.6).abs() < 1e-9);
        assert_eq!(happy.sample_size, 2);
        assert_eq!(happy.effective_sample_size, 3);

        let sad = predictor.predict("b", "sad", "26-35").expect("segment was trained");
        assert_eq!(sad.sample_size, 2);
        assert_eq!(sad.effective_sample_size, 1);

        assert!(predictor.predict("c", "calm", "50+").is_none());
        Ok(())
    }

    #[test]
    fn test_training_is_idempotent() -> Result<()> {
        let (_temp_dir, config) = seeded_config()?;

        sqlite_trainer(&config).run()?;
        let first = model_without_timestamps(&config.model_path)?;
        sqlite_trainer(&config).run()?;
        let second = model_without_timestamps(&config.model_path)?;

        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_training_merges_with_previous_model() -> Result<()> {
        let (_temp_dir, config) = seeded_config()?;
        sqlite_trainer(&config).run()?;

        // A later history that only mentions user "z" must not drop earlier segments
        fs::remove_file(&config.events_db_path)?;
        let conn = db::open(&config.events_db_path)?;
        db::record_event(&conn, &record("z", "energetic", "13-17", "t9", None))?;
        let catalog: FeatureCatalog = vec![vector("t9", 0.9, 0.9)].into_iter().collect();
        Trainer::from_config(&config, catalog).run()?;

        let model = ProfileStore::new(config.model_path.clone()).load();
        assert_eq!(model.len(), 3);
        assert!(model.contains(&SegmentKey::new("a", "happy", "18-25")));
        assert!(model.contains(&SegmentKey::new("z", "energetic", "13-17")));
        Ok(())
    }

    #[test]
    fn test_no_eligible_events_writes_nothing() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = RuntimeConfig::load(temp_dir.path().to_path_buf())?;
        let conn = db::open(&config.events_db_path)?;
        db::record_event(&conn, &record("a", "sad", "50+", "t1", Some("dislike")))?;

        let run = sqlite_trainer(&config).run()?;

        assert!(matches!(run, TrainingRun::NoEligibleEvents));
        assert!(!config.model_path.exists());
        Ok(())
    }

    #[test]
    fn test_missing_store_trains_from_snapshot() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = RuntimeConfig::load(temp_dir.path().to_path_buf())?;
        fs::write(
            &config.snapshot_path,
            r#"[
                {"user_id": "a", "mood": "Calm", "age_group": "36-50", "spotify_id": "t1", "feedback": "like"},
                {"user_id": "a", "mood": "calm", "age_group": "36-50", "spotify_id": "t2", "skipped": true}
            ]"#,
        )?;

        let (events, origin) = EventSource::from_config(&config).fetch_eligible_events_with_origin();
        assert_eq!(origin, EventOrigin::LocalSnapshot);
        assert_eq!(events.len(), 1);

        let catalog: FeatureCatalog = vec![vector("t1", 0.25, 0.4), vector("t2", 1.0, 1.0)].into_iter().collect();
        Trainer::from_config(&config, catalog).run()?;

        let profile = Predictor::from_config(&config).predict("a", "calm", "36-50").expect("trained from snapshot");
        assert_eq!(profile.features.valence, 0.25);
        assert_eq!(profile.sample_size, 1);
        assert_eq!(profile.effective_sample_size, 2);
        Ok(())
    }

    #[test]
    fn test_unavailable_feature_store_skips_every_segment() -> Result<()> {
        let (temp_dir, config) = seeded_config()?;
        let broken = SqliteFeatureStore::new(temp_dir.path().join("no-such.db"));

        let TrainingRun::Completed(report) = Trainer::from_config(&config, broken).run()? else {
            panic!("expected a completed run");
        };

        assert_eq!(report.trained_count(), 0);
        assert!(report.model.is_empty());
        assert!(matches!(
            report.outcomes[&SegmentKey::new("a", "happy", "18-25")],
            SegmentOutcome::Skipped(SkipReason::FeatureLookupFailed(_))
        ));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_concurrent_training_is_refused() -> Result<()> {
        let (_temp_dir, config) = seeded_config()?;
        let _held = moodmix::profile_store::TrainingLock::acquire(&config.lock_path)?;

        assert!(sqlite_trainer(&config).run().is_err());
        assert!(!config.model_path.exists());
        Ok(())
    }
}

#[cfg(test)]
mod serving_tests {
    use super::*;
    use moodmix::fallback::FallbackRecommender;
    use moodmix::mood::Mood;

    #[test]
    fn test_target_uses_baseline_until_trained() -> Result<()> {
        let (_temp_dir, config) = seeded_config()?;
        let predictor = Predictor::from_config(&config);

        let before = predictor.target("a", "happy", "18-25");
        assert_eq!(before.source, TargetSource::MoodBaseline);
        assert_eq!(before.features, Mood::Happy.baseline());

        sqlite_trainer(&config).run()?;

        let after = predictor.target("a", "happy", "18-25");
        assert_eq!(after.source, TargetSource::Learned);
        Ok(())
    }

    #[test]
    fn test_fallback_recommendations_from_snapshot() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = RuntimeConfig::load(temp_dir.path().to_path_buf())?;
        fs::write(
            &config.snapshot_path,
            r#"[
                {"spotify_id": "c1", "track_name": "Tide", "artist_name": "Sea", "mood": "calm", "source": "dataset"},
                {"spotify_id": "c2", "track_name": "Fog", "artist_name": "Hill", "mood": "calm", "source": "dataset"},
                {"spotify_id": "c3", "track_name": "Noise", "mood": "calm"}
            ]"#,
        )?;

        let tracks = FallbackRecommender::from_config(&config).recommend("calm", 3, &[]);

        let mut ids: Vec<_> = tracks.iter().map(|t| t.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["c1", "c2"]);
        Ok(())
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    fn moodmix(data_dir: &Path, args: &[&str]) -> std::process::Output {
        Command::new(env!("CARGO_BIN_EXE_moodmix"))
            .arg("--data-dir")
            .arg(data_dir)
            .args(args)
            .output()
            .expect("Failed to run moodmix")
    }

    #[test]
    fn test_cli_help_lists_commands() {
        let output = Command::new(env!("CARGO_BIN_EXE_moodmix"))
            .arg("--help")
            .output()
            .expect("Failed to run help command");

        let stdout = String::from_utf8_lossy(&output.stdout);
        for command in ["train", "predict", "target", "recommend", "history"] {
            assert!(stdout.contains(command), "help should mention {command}");
        }
    }

    #[test]
    fn test_cli_log_train_predict() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let features = temp_dir.path().join("features.json");
        fs::write(&features, serde_json::to_string(&vec![vector("t1", 0.7, 0.3)])?)?;

        let imported = moodmix(temp_dir.path(), &["import-features", features.to_str().unwrap()]);
        assert!(imported.status.success());

        let logged = moodmix(temp_dir.path(), &[
            "log", "--user", "ana", "--mood", "Sad", "--age-group", "26-35", "--track", "t1",
        ]);
        assert!(logged.status.success());

        let liked = moodmix(temp_dir.path(), &["feedback", "ana", "t1", "like"]);
        assert!(liked.status.success());

        let trained = moodmix(temp_dir.path(), &["train"]);
        assert!(trained.status.success());
        assert!(String::from_utf8_lossy(&trained.stdout).contains("ana|sad|26-35"));

        let predicted = moodmix(temp_dir.path(), &["predict", "ana", "sad", "26-35"]);
        let profile: serde_json::Value = serde_json::from_slice(&predicted.stdout)?;
        assert_eq!(profile["valence"], 0.7);
        assert_eq!(profile["effectiveSampleSize"], 2);
        Ok(())
    }

    #[test]
    fn test_cli_seed_features_then_train() -> Result<()> {
        let temp_dir = TempDir::new()?;

        let seeded = moodmix(temp_dir.path(), &["seed-features", "calm", "t1", "t2"]);
        assert!(seeded.status.success());

        let conn = db::open(&temp_dir.path().join("events.db"))?;
        let ids: std::collections::BTreeSet<String> = ["t1", "t2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(db::get_audio_features(&conn, &ids)?.len(), 2);

        db::record_event(&conn, &record("ana", "calm", "50+", "t1", None))?;
        let trained = moodmix(temp_dir.path(), &["train"]);
        assert!(trained.status.success());

        let target = moodmix(temp_dir.path(), &["target", "ana", "calm", "50+"]);
        let target: serde_json::Value = serde_json::from_slice(&target.stdout)?;
        assert_eq!(target["source"], "learned");
        let valence = target["valence"].as_f64().expect("valence is a number");
        assert!((valence - 0.3).abs() <= 0.1 + f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_cli_activity_suggestions() -> Result<()> {
        use moodmix::activity::{age_activities, DEFAULT_ACTIVITY};
        use moodmix::mood::Mood;

        let temp_dir = TempDir::new()?;

        let output = moodmix(temp_dir.path(), &["activity", "Stressed", "13-17"]);
        assert!(output.status.success());
        let suggestion = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let expected = age_activities(Mood::Stressed, "13-17").expect("age group has suggestions");
        assert!(expected.contains(&suggestion.as_str()));

        let output = moodmix(temp_dir.path(), &["activity", "angry", "13-17"]);
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), DEFAULT_ACTIVITY);
        Ok(())
    }

    #[test]
    fn test_cli_predict_untrained_prints_null() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let output = moodmix(temp_dir.path(), &["predict", "nobody", "calm", "50+"]);

        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "null");
        Ok(())
    }
}
