//! Per-cycle snapshots of the track set and the single-slot buffer that hands
//! them to other threads.

use crate::{track::Track, types::TrackId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One persisted row per track per cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackRow {
    pub id: TrackId,
    pub lon: f64,
    pub lat: f64,
    pub mos: f64,
    pub lon_velocity: f64,
    pub lat_velocity: f64,
    pub mos_velocity: f64,
    pub predicted_lon: f64,
    pub predicted_lat: f64,
    pub predicted_mos: f64,
    /// Last refresh, whole epoch seconds
    pub refresh_time: i64,
}

impl From<&Track> for TrackRow {
    fn from(t: &Track) -> Self {
        Self {
            id: t.id,
            lon: t.lon,
            lat: t.lat,
            mos: t.mos,
            lon_velocity: t.velocity.0,
            lat_velocity: t.velocity.1,
            mos_velocity: t.velocity.2,
            predicted_lon: t.predicted_lon,
            predicted_lat: t.predicted_lat,
            predicted_mos: t.predicted_mos,
            refresh_time: t.refresh_time().floor() as i64,
        }
    }
}

/// Immutable deep copy of all tracks after one cycle.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub cycle: u64,
    tracks: Arc<Vec<Track>>,
}

impl Snapshot {
    pub fn new(cycle: u64, tracks: Vec<Track>) -> Self {
        Self {
            cycle,
            tracks: Arc::new(tracks),
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn rows(&self) -> Vec<TrackRow> {
        self.tracks.iter().map(TrackRow::from).collect()
    }
}

/// Single-slot, last-writer-wins holder for the latest snapshot.
#[derive(Debug, Default)]
pub struct SnapshotBuffer {
    slot: RwLock<Option<Snapshot>>,
}

impl SnapshotBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, snapshot: Snapshot) {
        *self.slot.write() = Some(snapshot);
    }

    /// Latest snapshot, if any cycle has completed.
    pub fn latest(&self) -> Option<Snapshot> {
        self.slot.read().clone()
    }
}
