//! Simulated vehicles and their motion.
//!
//! Each vehicle has a true state `[lon, lat, v_lon, v_lat]`, a constant height
//! (`mos`), visual attributes the cameras can read, and a `MotionSpec`
//! describing how it moves between simulator steps.

use serde::{Deserialize, Serialize};

/// How a vehicle moves between steps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MotionSpec {
    /// Straight line at the initial velocity.
    ConstantVelocity,
    /// Constant turn rate in the lon/lat plane. `omega` in rad/s.
    ConstantTurn { omega: f64 },
    /// Drive along a polyline at `speed`, stopping at the last point.
    Route { waypoints: Vec<[f64; 2]>, speed: f64 },
}

/// A simulated vehicle with ground-truth state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: u64,
    /// True state [lon, lat, v_lon, v_lat]
    pub state: [f64; 4],
    /// Meters over sea
    pub mos: f64,
    pub motion: MotionSpec,
    /// Body colour, RGB channels in [0, 255]
    pub color: [f64; 3],
    pub plate: String,
    /// No detections before this time
    pub appear_at: Option<f64>,
    /// No detections from this time on
    pub disappear_at: Option<f64>,
    /// Index of the route point being driven to
    #[serde(default)]
    pub next_waypoint: usize,
}

impl Target {
    /// Propagate the true state by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        let s = &mut self.state;
        match &self.motion {
            MotionSpec::ConstantVelocity => {
                s[0] += s[2] * dt;
                s[1] += s[3] * dt;
            }
            MotionSpec::ConstantTurn { omega } => {
                let v = s[2].hypot(s[3]);
                let heading = s[3].atan2(s[2]);
                let new_heading = heading + omega * dt;
                s[0] += v * heading.cos() * dt;
                s[1] += v * heading.sin() * dt;
                s[2] = v * new_heading.cos();
                s[3] = v * new_heading.sin();
            }
            MotionSpec::Route { waypoints, speed } => {
                let mut budget = speed * dt;
                while budget > 0.0 {
                    let Some(wp) = waypoints.get(self.next_waypoint) else {
                        s[2] = 0.0;
                        s[3] = 0.0;
                        break;
                    };
                    let (dx, dy) = (wp[0] - s[0], wp[1] - s[1]);
                    let dist = dx.hypot(dy);
                    if dist <= budget {
                        s[0] = wp[0];
                        s[1] = wp[1];
                        budget -= dist;
                        self.next_waypoint += 1;
                        continue;
                    }
                    s[0] += budget * dx / dist;
                    s[1] += budget * dy / dist;
                    s[2] = speed * dx / dist;
                    s[3] = speed * dy / dist;
                    budget = 0.0;
                }
            }
        }
    }

    /// True if the vehicle is on the road at time `t`.
    pub fn is_active(&self, t: f64) -> bool {
        if self.appear_at.is_some_and(|appear| t < appear) {
            return false;
        }
        if self.disappear_at.is_some_and(|gone| t >= gone) {
            return false;
        }
        true
    }

    pub fn position(&self) -> (f64, f64, f64) {
        (self.state[0], self.state[1], self.mos)
    }
}
