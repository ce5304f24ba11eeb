//! `sim`: scenario simulator: vehicle trajectories, camera detections, replay.

pub mod replay;
pub mod scenarios;
pub mod sensor_sim;
pub mod target;

pub use replay::{load_replay, save_replay, ReplayLog, ReplaySource};
pub use scenarios::{Scenario, ScenarioKind};
pub use sensor_sim::{CameraParams, CameraSimulator, SimCamera};
pub use target::{MotionSpec, Target};
