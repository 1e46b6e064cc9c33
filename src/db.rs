//! SQLite storage for listening events and the local feature catalogue.
//!
//! Two tables live in `events.db`:
//!
//! ```text
//! listening_events(id, user_id, mood, age_group, track_id, track_name,
//!                  artist_name, image_url, feedback, skipped, source, created_at)
//! audio_features(track_id, valence, energy, danceability, acousticness, tempo)
//! ```
//!
//! Write paths use [`open`], which creates the database on first use.
//! Read paths that must detect an unavailable store use [`open_existing`],
//! which never creates a file.

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, trace};
use rusqlite::{params, Connection, OpenFlags, Row};
use std::collections::BTreeSet;
use std::path::Path;

use crate::event::{EventRecord, Feedback};
use crate::features::{AudioFeatureVector, FeatureValues};

const EVENT_COLUMNS: &str =
    "user_id, mood, age_group, track_id, track_name, artist_name, image_url, feedback, skipped, source, created_at";

/// Open (creating if needed) the database and ensure the schema exists.
///
/// This is the entry point for every write path: recording events,
/// importing snapshots and loading feature vectors.
///
/// # Errors
///
/// This function will return an error if:
/// - The file cannot be created or opened (missing directory, permissions)
/// - The file exists but is not an SQLite database
/// - Schema creation fails
///
/// # Examples
///
/// ```no_run
/// use moodmix::config::RuntimeConfig;
/// use moodmix::db;
///
/// let config = RuntimeConfig::new()?;
/// let conn = db::open(&config.events_db_path)?;
/// let history = db::history(&conn, "ana")?;
/// println!("{} events", history.len());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn open(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open event database at {}", db_path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Open an existing database without creating it
///
/// # Errors
///
/// Returns an error if no database exists at `db_path` or it cannot be
/// opened read-write. Callers treat this as "store unavailable".
pub fn open_existing(db_path: &Path) -> Result<Connection> {
    Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_WRITE)
        .with_context(|| format!("Event database not available at {}", db_path.display()))
}

/// Create tables and indexes if they are missing
///
/// # Errors
///
/// Returns an error if any `CREATE` statement fails.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS listening_events (
            id          INTEGER PRIMARY KEY,
            user_id     TEXT,
            mood        TEXT,
            age_group   TEXT,
            track_id    TEXT,
            track_name  TEXT,
            artist_name TEXT,
            image_url   TEXT,
            feedback    TEXT,
            skipped     INTEGER NOT NULL DEFAULT 0,
            source      TEXT,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_user_track
            ON listening_events(user_id, track_id);
        CREATE TABLE IF NOT EXISTS audio_features (
            track_id     TEXT PRIMARY KEY,
            valence      REAL NOT NULL,
            energy       REAL NOT NULL,
            danceability REAL NOT NULL,
            acousticness REAL NOT NULL,
            tempo        REAL NOT NULL
        );",
    )
    .context("Failed to create event database schema")?;
    Ok(())
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<EventRecord> {
    Ok(EventRecord {
        user_id: row.get(0)?,
        mood: row.get(1)?,
        age_group: row.get(2)?,
        spotify_id: row.get(3)?,
        track_name: row.get(4)?,
        artist_name: row.get(5)?,
        image_url: row.get(6)?,
        feedback: row.get(7)?,
        skipped: Some(row.get(8)?),
        source: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn insert_record(conn: &Connection, record: &EventRecord) -> Result<i64> {
    let created_at = record
        .created_at
        .clone()
        .unwrap_or_else(|| Utc::now().to_rfc3339());

    conn.execute(
        &format!("INSERT INTO listening_events ({EVENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
        params![
            record.user_id,
            record.mood.as_deref().map(str::to_lowercase),
            record.age_group,
            record.spotify_id,
            record.track_name,
            record.artist_name,
            record.image_url,
            record.feedback,
            record.skipped.unwrap_or(false),
            record.source,
            created_at,
        ],
    )
    .context("Failed to INSERT listening event")?;

    Ok(conn.last_insert_rowid())
}

/// Record one listening event.
///
/// The mood is stored lowercased; `created_at` defaults to now.
///
/// # Returns
///
/// * `Ok(i64)` - Row id of the new event
///
/// # Errors
///
/// Returns an error if the INSERT fails.
pub fn record_event(conn: &Connection, record: &EventRecord) -> Result<i64> {
    let id = insert_record(conn, record)?;
    trace!("Recorded listening event {id}");
    Ok(id)
}

/// Copy many records in one transaction
///
/// # Returns
///
/// * `Ok(usize)` - Number of records imported
///
/// # Errors
///
/// Returns an error if any insert or the commit fails; nothing is imported
/// in that case.
pub fn import_records(conn: &mut Connection, records: &[EventRecord]) -> Result<usize> {
    let tx = conn.transaction()?;
    for record in records {
        insert_record(&tx, record)?;
    }
    tx.commit().context("Failed to commit imported events")?;

    debug!("Imported {} listening events", records.len());
    Ok(records.len())
}

/// Events usable for training: a track id is present, the track was not
/// skipped and was not disliked.
///
/// # Errors
///
/// Returns an error if the query cannot be prepared or a row cannot be
/// read, e.g. when the database lacks the `listening_events` table.
pub fn fetch_eligible(conn: &Connection) -> Result<Vec<EventRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM listening_events
         WHERE track_id IS NOT NULL AND track_id != ''
           AND skipped = 0
           AND (feedback IS NULL OR feedback != 'dislike')
         ORDER BY id"
    ))
    .context("Failed to prepare eligible event query")?;

    let records = stmt
        .query_map([], row_to_record)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read eligible events")?;

    Ok(records)
}

/// A user's events, newest first
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn history(conn: &Connection, user_id: &str) -> Result<Vec<EventRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM listening_events
         WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC"
    ))?;

    let records = stmt
        .query_map([user_id], row_to_record)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to read history for {user_id}"))?;

    Ok(records)
}

const LATEST_EVENT: &str = "SELECT id FROM listening_events
     WHERE user_id = ?1 AND track_id = ?2
     ORDER BY created_at DESC, id DESC LIMIT 1";

/// Attach feedback to the user's most recent event for `track_id`.
///
/// # Returns
///
/// * `Ok(true)` - The latest event was updated
/// * `Ok(false)` - The user never listened to the track
///
/// # Errors
///
/// Returns an error if the UPDATE fails.
pub fn set_feedback(conn: &Connection, user_id: &str, track_id: &str, feedback: Feedback) -> Result<bool> {
    let changed = conn
        .execute(
            &format!("UPDATE listening_events SET feedback = ?3 WHERE id = ({LATEST_EVENT})"),
            params![user_id, track_id, feedback.as_label()],
        )
        .context("Failed to UPDATE feedback")?;
    Ok(changed > 0)
}

/// Mark the user's most recent event for `track_id` as skipped.
///
/// # Returns
///
/// * `Ok(true)` - The latest event was updated
/// * `Ok(false)` - The user never listened to the track
///
/// # Errors
///
/// Returns an error if the UPDATE fails.
pub fn mark_skipped(conn: &Connection, user_id: &str, track_id: &str) -> Result<bool> {
    let changed = conn
        .execute(
            &format!("UPDATE listening_events SET skipped = 1 WHERE id = ({LATEST_EVENT})"),
            params![user_id, track_id],
        )
        .context("Failed to UPDATE skipped flag")?;
    Ok(changed > 0)
}

/// Insert or replace feature vectors in the local catalogue
///
/// # Errors
///
/// Returns an error if any insert or the commit fails; the catalogue is
/// left unchanged in that case.
pub fn upsert_audio_features(conn: &mut Connection, vectors: &[AudioFeatureVector]) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO audio_features
                (track_id, valence, energy, danceability, acousticness, tempo)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for v in vectors {
            stmt.execute(params![
                v.id,
                v.values.valence,
                v.values.energy,
                v.values.danceability,
                v.values.acousticness,
                v.values.tempo,
            ])?;
        }
    }
    tx.commit().context("Failed to commit feature vectors")?;
    Ok(vectors.len())
}

/// Look up feature vectors for the given ids in one query.
///
/// # Returns
///
/// * `Ok(Vec<AudioFeatureVector>)` - One vector per known id, ordered by id;
///   unknown ids are simply absent
///
/// # Errors
///
/// Returns an error if the query fails, e.g. when the database has no
/// `audio_features` table.
pub fn get_audio_features(conn: &Connection, track_ids: &BTreeSet<String>) -> Result<Vec<AudioFeatureVector>> {
    let mut stmt = conn
        .prepare(
            "SELECT track_id, valence, energy, danceability, acousticness, tempo
             FROM audio_features
             WHERE track_id IN (SELECT value FROM json_each(?1))
             ORDER BY track_id",
        )
        .context("Failed to prepare feature lookup")?;

    let ids_json = serde_json::to_string(track_ids)?;
    let vectors = stmt
        .query_map([ids_json], |row| {
            Ok(AudioFeatureVector {
                id: row.get(0)?,
                values: FeatureValues::new(row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read feature vectors")?;

    Ok(vectors)
}
