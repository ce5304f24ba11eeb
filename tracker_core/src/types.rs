//! Fundamental types used across the entire workspace.

use nalgebra::{Matrix2x4, Matrix4, Vector2, Vector4};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use sensor_models::SensorId;

// ---------------------------------------------------------------------------
// Kinematic state: [lon, lat, v_lon, v_lat], f64 throughout
// ---------------------------------------------------------------------------

/// 4-element state vector: [lon, lat, v_lon, v_lat]
pub type StateVec = Vector4<f64>;

/// 4×4 state covariance (also used for A and Q)
pub type StateCov = Matrix4<f64>;

/// Measurement model H (observes lon/lat)
pub type ObsMat = Matrix2x4<f64>;

/// Observation-space vector [lon, lat]
pub type ObsVec = Vector2<f64>;

// ---------------------------------------------------------------------------
// Identifier types
// ---------------------------------------------------------------------------

/// Track identity: a random v4 UUID assigned at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub Uuid);

impl TrackId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0.simple())
    }
}

// ---------------------------------------------------------------------------
// Geometry helpers
// ---------------------------------------------------------------------------

/// Planar distance over lon/lat.
pub fn dist2d(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Distance over lon/lat/mos.
pub fn dist3d(a: (f64, f64, f64), b: (f64, f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2) + (a.2 - b.2).powi(2)).sqrt()
}
