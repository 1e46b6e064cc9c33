//! Where training events come from.
//!
//! The primary store is queried with the eligibility filter applied in SQL.
//! If it cannot be opened or queried, the local snapshot is read instead and
//! the same filter is applied client-side. Either way the caller gets a
//! plain list; falling back is logged, never an error.

use anyhow::Result;
use log::{info, warn};
use std::path::PathBuf;

use crate::config::RuntimeConfig;
use crate::db;
use crate::event::{EventRecord, ListeningEvent};
use crate::snapshot;

/// Which store actually supplied the events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrigin {
    PrimaryStore,
    LocalSnapshot,
}

/// Event source with a primary SQLite store and a JSON snapshot fallback
#[derive(Debug, Clone)]
pub struct EventSource {
    events_db_path: PathBuf,
    snapshot_path: PathBuf,
    placeholder_prefix: String,
}

impl EventSource {
    #[must_use]
    pub fn new(events_db_path: PathBuf, snapshot_path: PathBuf, placeholder_prefix: impl Into<String>) -> Self {
        Self {
            events_db_path,
            snapshot_path,
            placeholder_prefix: placeholder_prefix.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(
            config.events_db_path.clone(),
            config.snapshot_path.clone(),
            config.training.placeholder_prefix.clone(),
        )
    }

    /// Eligible events from the primary store, or from the snapshot if the
    /// primary store is unavailable
    #[must_use]
    pub fn fetch_eligible_events(&self) -> Vec<ListeningEvent> {
        self.fetch_eligible_events_with_origin().0
    }

    /// Like [`fetch_eligible_events`](Self::fetch_eligible_events), also
    /// reporting which store answered
    #[must_use]
    pub fn fetch_eligible_events_with_origin(&self) -> (Vec<ListeningEvent>, EventOrigin) {
        let (records, origin) = match self.fetch_primary() {
            Ok(records) => {
                info!("Fetched {} events from the primary store for training", records.len());
                (records, EventOrigin::PrimaryStore)
            }
            Err(e) => {
                warn!("Primary event store unavailable, trying local snapshot: {e:#}");
                let records = snapshot::load_eligible(&self.snapshot_path);
                info!("Loaded {} eligible events from the local snapshot", records.len());
                (records, EventOrigin::LocalSnapshot)
            }
        };

        let events = records
            .iter()
            .map(|record| record.to_event(&self.placeholder_prefix))
            .collect();

        (events, origin)
    }

    fn fetch_primary(&self) -> Result<Vec<EventRecord>> {
        let conn = db::open_existing(&self.events_db_path)?;
        db::fetch_eligible(&conn)
    }
}
