//! Track lifecycle management: initialisation from unmatched reports, TTL
//! expiry, and ownership of the live track collection.
//!
//! # Track initialisation
//! Each not-associated group is clustered in two greedy phases:
//! - **Pairwise rating**: every unordered report pair is rated
//!   `1 / distance` over lon/lat (coincident reports rate +∞). Pairs rating at
//!   least `initialization_threshold` become weighted edges.
//! - **Chain merge**: edges are taken strongest first, ties broken by the
//!   report order of the endpoints. The seed edge (a, b) opens a cluster that
//!   also takes every report linked to both a and b. All edges touching the
//!   cluster are dropped. Reports left without a cluster stand alone.
//!
//! Every cluster becomes one track at the cluster centroid.

use crate::{
    kf::KalmanFilter,
    report::{DetectionReport, ReportGroup},
    track::Track,
    types::{dist2d, TrackId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Track id → reports applied to that track this cycle.
pub type Associations = BTreeMap<TrackId, ReportGroup>;

/// Configuration for track initialisation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackManagerConfig {
    /// Minimum pairwise rating (1 / lon-lat distance) to link two reports
    pub initialization_threshold: f64,
}

impl Default for TrackManagerConfig {
    fn default() -> Self {
        Self {
            initialization_threshold: 5000.0,
        }
    }
}

/// Owns the live tracks, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct TrackManager {
    pub config: TrackManagerConfig,
    tracks: Vec<Track>,
}

impl TrackManager {
    pub fn new(config: TrackManagerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn tracks_mut(&mut self) -> &mut [Track] {
        &mut self.tracks
    }

    /// Deep copy of the live collection.
    pub fn tracks_snapshot(&self) -> Vec<Track> {
        self.tracks.clone()
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Register an externally built track.
    pub fn insert(&mut self, track: Track) -> TrackId {
        let id = track.id;
        self.tracks.push(track);
        id
    }

    /// Cluster every group and create one track per cluster.
    pub fn initialize_tracks(
        &mut self,
        groups: &[ReportGroup],
        prototype: &KalmanFilter,
    ) -> Associations {
        let mut born = Associations::new();
        for group in groups {
            for cluster in cluster_reports(group, self.config.initialization_threshold) {
                let id = self.initialize_track(&cluster, prototype);
                born.insert(id, cluster);
            }
        }
        born
    }

    /// Create a track from one non-empty cluster: centroid position, latest
    /// sensor time, fused features and a fresh copy of the prototype filter.
    pub fn initialize_track(&mut self, cluster: &ReportGroup, prototype: &KalmanFilter) -> TrackId {
        let n = cluster.len().max(1) as f64;
        let (lon, lat, mos) = cluster.iter().fold((0.0, 0.0, 0.0), |acc, dr| {
            (acc.0 + dr.lon, acc.1 + dr.lat, acc.2 + dr.mos)
        });
        let created = cluster
            .last()
            .map_or(f64::NEG_INFINITY, |dr| dr.sensor_time);

        let mut track = Track::new(
            prototype.clone(),
            (lon / n, lat / n, mos / n),
            (0.0, 0.0),
            created,
        );
        for dr in cluster {
            track.features.merge_all(&dr.features);
        }
        debug!(track = %track.id, reports = cluster.len(), "track initialised");
        self.insert(track)
    }

    /// Remove every track with `now - refresh_time > ttl`. Returns the count.
    pub fn remove_expired_tracks(&mut self, now: f64, ttl: f64) -> usize {
        let before = self.tracks.len();
        self.tracks.retain(|t| t.is_valid(now, ttl));
        before - self.tracks.len()
    }

    /// Same as [`remove_expired_tracks`](Self::remove_expired_tracks) with
    /// `now` taken as the latest refresh time among the tracks.
    pub fn remove_expired_tracks_latest(&mut self, ttl: f64) -> usize {
        match self.latest_refresh_time() {
            Some(now) => self.remove_expired_tracks(now, ttl),
            None => 0,
        }
    }

    pub fn latest_refresh_time(&self) -> Option<f64> {
        self.tracks
            .iter()
            .map(Track::refresh_time)
            .max_by(|a, b| a.total_cmp(b))
    }
}

// ---------------------------------------------------------------------------
// Clustering
// ---------------------------------------------------------------------------

struct Edge {
    a: usize,
    b: usize,
    rate: f64,
}

/// Two-phase greedy clustering of one group. Every report ends up in exactly
/// one returned cluster.
pub fn cluster_reports(group: &ReportGroup, threshold: f64) -> Vec<ReportGroup> {
    let drs: Vec<&DetectionReport> = group.iter().collect();
    let n = drs.len();

    let mut edges = Vec::new();
    for a in 0..n {
        for b in (a + 1)..n {
            let rate = 1.0 / dist2d((drs[a].lon, drs[a].lat), (drs[b].lon, drs[b].lat));
            if rate >= threshold {
                edges.push(Edge { a, b, rate });
            }
        }
    }
    edges.sort_by(|x, y| {
        y.rate
            .total_cmp(&x.rate)
            .then(x.a.cmp(&y.a))
            .then(x.b.cmp(&y.b))
    });

    let mut linked = vec![vec![false; n]; n];
    for e in &edges {
        linked[e.a][e.b] = true;
        linked[e.b][e.a] = true;
    }

    let mut assigned = vec![false; n];
    let mut clusters = Vec::new();
    for seed in &edges {
        if !linked[seed.a][seed.b] {
            continue;
        }
        let mut members = vec![seed.a, seed.b];
        for k in 0..n {
            if k != seed.a && k != seed.b && !assigned[k] && linked[seed.a][k] && linked[seed.b][k]
            {
                members.push(k);
            }
        }
        for &m in &members {
            assigned[m] = true;
            for other in 0..n {
                linked[m][other] = false;
                linked[other][m] = false;
            }
        }
        clusters.push(members.iter().map(|&m| drs[m].clone()).collect::<ReportGroup>());
    }

    for (i, dr) in drs.iter().enumerate() {
        if !assigned[i] {
            clusters.push(ReportGroup::from([(*dr).clone()]));
        }
    }
    clusters
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
