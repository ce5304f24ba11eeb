//! Detection reports: a single sensor observation with position, time and
//! features.
//!
//! Reports are value types. Equality and ordering only look at
//! `(sensor_time, dr_id)`, which gives the strict total order every sweep in
//! the engine relies on.

use crate::feature::{Feature, FeatureSet};
use crate::types::SensorId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// A set of reports in report order.
pub type ReportGroup = BTreeSet<DetectionReport>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionReport {
    /// Report id, unique within a sensor time
    pub dr_id: u64,
    /// Originating sensor, resolved through the sensor directory
    pub sensor_id: SensorId,
    pub lon: f64,
    pub lat: f64,
    /// Meters over sea
    pub mos: f64,
    /// Time the report reached the store (seconds)
    pub upload_time: f64,
    /// Time the sensor observed the object (seconds)
    pub sensor_time: f64,
    #[serde(default)]
    pub features: FeatureSet,
}

impl DetectionReport {
    /// A report uploaded at the instant it was observed, without features.
    pub fn new(
        dr_id: u64,
        sensor_id: SensorId,
        lon: f64,
        lat: f64,
        mos: f64,
        sensor_time: f64,
    ) -> Self {
        Self {
            dr_id,
            sensor_id,
            lon,
            lat,
            mos,
            upload_time: sensor_time,
            sensor_time,
            features: FeatureSet::new(),
        }
    }

    pub fn with_upload_time(mut self, upload_time: f64) -> Self {
        self.upload_time = upload_time;
        self
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.merge(&feature);
        self
    }

    pub fn position(&self) -> (f64, f64, f64) {
        (self.lon, self.lat, self.mos)
    }
}

impl PartialEq for DetectionReport {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DetectionReport {}

impl PartialOrd for DetectionReport {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DetectionReport {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sensor_time
            .total_cmp(&other.sensor_time)
            .then(self.dr_id.cmp(&other.dr_id))
    }
}
