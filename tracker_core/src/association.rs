//! Data association: greedy assignment of candidate groups to existing tracks.
//!
//! # Algorithm
//! Tracks are visited in manager order. For each track every group in the
//! pool is rated: reports whose rate reaches `dr_rate_threshold` are pulled
//! out into a matched subset, and the list comparator aggregates their rates.
//! The best-rated group with a non-empty subset wins (first group on ties);
//! its subset goes to the track and only that group shrinks to its remainder.
//! There is no backtracking. Whatever is left in the pool is not associated.

use crate::{
    comparator::{Grades, ListResultComparator, ResultComparator},
    report::{DetectionReport, ReportGroup},
    track::Track,
    track_manager::Associations,
    types::dist3d,
};
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Unset,
    InputLoaded,
    Computed,
}

/// Outcome of rating one group against one track.
#[derive(Clone, Debug)]
pub struct ListRating {
    pub rate: f64,
    pub matched: ReportGroup,
    /// Latest sensor time among matched reports
    pub max_time: Option<f64>,
}

pub struct DataAssociator {
    comparator: Box<dyn ResultComparator>,
    list_comparator: Box<dyn ListResultComparator>,
    dr_rate_threshold: f64,
    state: State,
    pool: Vec<ReportGroup>,
    associated: Associations,
}

impl DataAssociator {
    pub fn new(
        comparator: Box<dyn ResultComparator>,
        list_comparator: Box<dyn ListResultComparator>,
        dr_rate_threshold: f64,
    ) -> Self {
        Self {
            comparator,
            list_comparator,
            dr_rate_threshold,
            state: State::Unset,
            pool: Vec::new(),
            associated: Associations::new(),
        }
    }

    pub fn set_comparator(&mut self, comparator: Box<dyn ResultComparator>) {
        self.comparator = comparator;
    }

    pub fn set_list_comparator(&mut self, list_comparator: Box<dyn ListResultComparator>) {
        self.list_comparator = list_comparator;
    }

    pub fn set_dr_rate_threshold(&mut self, threshold: f64) {
        self.dr_rate_threshold = threshold;
    }

    /// Load the candidate groups of one cycle. Drops any previous result.
    pub fn set_input(&mut self, groups: Vec<ReportGroup>) {
        self.pool = groups;
        self.associated.clear();
        self.state = State::InputLoaded;
    }

    /// Track id → matched reports (possibly empty) for every track.
    pub fn drs_for_tracks(&mut self, tracks: &mut [Track]) -> &Associations {
        self.compute(tracks);
        &self.associated
    }

    /// Non-empty groups left in the pool after association.
    pub fn not_associated(&mut self, tracks: &mut [Track]) -> Vec<ReportGroup> {
        self.compute(tracks);
        self.pool.iter().filter(|g| !g.is_empty()).cloned().collect()
    }

    /// Run association unless the current input was already computed.
    pub fn compute(&mut self, tracks: &mut [Track]) {
        if self.state == State::Computed {
            return;
        }
        if self.state == State::Unset {
            self.pool.clear();
        }
        self.associated.clear();

        for track in tracks.iter_mut() {
            let mut best: Option<(usize, ReportGroup, ListRating)> = None;
            for (i, group) in self.pool.iter().enumerate() {
                let mut rest = group.clone();
                let rating = self.rate_list_for_track(&mut rest, track);
                if rating.matched.is_empty() {
                    continue;
                }
                if best.as_ref().map_or(true, |(_, _, b)| rating.rate > b.rate) {
                    best = Some((i, rest, rating));
                }
            }

            match best {
                Some((i, rest, rating)) => {
                    trace!(track = %track.id, group = i, rate = rating.rate, "group chosen");
                    self.pool[i] = rest;
                    if let Some(t) = rating.max_time {
                        // Older reports can still match a fresher track.
                        track.refresh(t.max(track.refresh_time()));
                    }
                    self.associated.insert(track.id, rating.matched);
                }
                None => {
                    self.associated.insert(track.id, ReportGroup::new());
                }
            }
        }
        self.state = State::Computed;
    }

    /// Pull reports that fit `track` out of `group` and rate the pulled list.
    pub fn rate_list_for_track(&self, group: &mut ReportGroup, track: &Track) -> ListRating {
        let mut rates = Vec::new();
        let mut matched = ReportGroup::new();
        let mut max_time: Option<f64> = None;

        group.retain(|dr| {
            let rate = self.rate_dr_for_track(dr, track);
            if rate >= self.dr_rate_threshold {
                rates.push(rate);
                max_time = Some(max_time.map_or(dr.sensor_time, |t| t.max(dr.sensor_time)));
                matched.insert(dr.clone());
                false
            } else {
                true
            }
        });

        ListRating {
            rate: self.list_comparator.rate(&rates),
            matched,
            max_time,
        }
    }

    /// Rate one report: grade each of its features against the track's
    /// feature of the same name (0 if the track lacks it), then combine with
    /// the distance.
    pub fn rate_dr_for_track(&self, dr: &DetectionReport, track: &Track) -> f64 {
        let grades: Grades = dr
            .features
            .iter()
            .map(|f| {
                let grade = track
                    .features
                    .get(f.name())
                    .map_or(0.0, |tf| f.compare(tf));
                (f.name(), grade)
            })
            .collect();
        self.comparator
            .rate(&grades, dist3d(dr.position(), track.position()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
