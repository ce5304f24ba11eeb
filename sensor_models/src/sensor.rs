//! Sensor descriptions: identity, placement, coverage range.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SensorId(pub u32);

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// What kind of device produced the detections.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Street camera (the common case)
    #[default]
    Camera,
    /// Ground radar
    Radar,
    /// Anything else reporting positions
    Generic,
}

/// Physical configuration of one sensor.
///
/// Positions use the same frame as detection reports: longitude, latitude
/// and meters over sea. `range` is expressed in that frame as well, so the
/// coverage volume is a sphere of radius `range` around the sensor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: SensorId,
    pub lon: f64,
    pub lat: f64,
    /// Meters over sea
    pub mos: f64,
    /// Coverage radius
    pub range: f64,
    #[serde(default)]
    pub kind: SensorKind,
}

impl Sensor {
    pub fn new(id: u32, lon: f64, lat: f64, mos: f64, range: f64, kind: SensorKind) -> Self {
        Self {
            id: SensorId(id),
            lon,
            lat,
            mos,
            range,
            kind,
        }
    }

    /// Convenience constructor for a camera (most sensors in the field).
    pub fn camera(id: u32, lon: f64, lat: f64, mos: f64, range: f64) -> Self {
        Self::new(id, lon, lat, mos, range, SensorKind::Camera)
    }

    /// True if the point lies inside the coverage sphere (boundary included).
    pub fn is_in_range(&self, lon: f64, lat: f64, mos: f64) -> bool {
        let d2 = (lon - self.lon).powi(2) + (lat - self.lat).powi(2) + (mos - self.mos).powi(2);
        d2 <= self.range * self.range
    }

    /// True if the coverage spheres of both sensors intersect or touch.
    pub fn overlaps(&self, other: &Sensor) -> bool {
        let d = ((self.lon - other.lon).powi(2)
            + (self.lat - other.lat).powi(2)
            + (self.mos - other.mos).powi(2))
        .sqrt();
        d <= self.range + other.range
    }
}
