//! Track: estimated position, prediction, features and the owned filter.

use crate::{
    error::FilterError,
    feature::FeatureSet,
    kf::KalmanFilter,
    report::DetectionReport,
    types::{StateVec, TrackId},
};

/// A single tracked object.
#[derive(Clone, Debug)]
pub struct Track {
    /// Unique identifier
    pub id: TrackId,
    pub lon: f64,
    pub lat: f64,
    /// Meters over sea (carried from creation, not filtered)
    pub mos: f64,
    pub predicted_lon: f64,
    pub predicted_lat: f64,
    pub predicted_mos: f64,
    /// Velocity [lon, lat, mos] per filter step
    pub velocity: (f64, f64, f64),
    /// Fused features of every report applied so far
    pub features: FeatureSet,
    /// Time of creation
    pub born_at: f64,
    refresh_time: f64,
    filter: KalmanFilter,
}

impl Track {
    /// Create a track at the given position, initialising `filter` with that
    /// position, zero velocity and the given per-axis position variance.
    pub fn new(
        mut filter: KalmanFilter,
        position: (f64, f64, f64),
        variance: (f64, f64),
        creation_time: f64,
    ) -> Self {
        let (lon, lat, mos) = position;
        let predicted = filter.initialize(
            StateVec::new(lon, lat, 0.0, 0.0),
            StateVec::new(variance.0, variance.1, 0.0, 0.0),
        );
        Self {
            id: TrackId::new_v4(),
            lon,
            lat,
            mos,
            predicted_lon: predicted[0],
            predicted_lat: predicted[1],
            predicted_mos: mos,
            velocity: (predicted[2], predicted[3], 0.0),
            features: FeatureSet::new(),
            born_at: creation_time,
            refresh_time: creation_time,
            filter,
        }
    }

    pub fn refresh_time(&self) -> f64 {
        self.refresh_time
    }

    /// Bump the refresh time without touching the estimate.
    pub fn refresh(&mut self, time: f64) {
        debug_assert!(
            time >= self.refresh_time,
            "track {} refreshed backwards: {} < {}",
            self.id,
            time,
            self.refresh_time
        );
        self.refresh_time = time;
    }

    /// Valid while `now - refresh_time <= ttl`.
    pub fn is_valid(&self, now: f64, ttl: f64) -> bool {
        now - self.refresh_time <= ttl
    }

    pub fn filter(&self) -> &KalmanFilter {
        &self.filter
    }

    /// Fuse one report: correct the filter with its position, take the
    /// corrected position, predict the next one, and fuse its features.
    pub fn apply_measurement(&mut self, dr: &DetectionReport) -> Result<(), FilterError> {
        let z = StateVec::new(dr.lon, dr.lat, 0.0, 0.0);
        let corrected = self.filter.correct(&z)?;
        self.lon = corrected[0];
        self.lat = corrected[1];
        self.velocity = (corrected[2], corrected[3], 0.0);

        let predicted = self.filter.predict()?;
        self.predicted_lon = predicted[0];
        self.predicted_lat = predicted[1];
        self.predicted_mos = self.mos;

        self.features.merge_all(&dr.features);
        Ok(())
    }

    pub fn position(&self) -> (f64, f64, f64) {
        (self.lon, self.lat, self.mos)
    }
}
