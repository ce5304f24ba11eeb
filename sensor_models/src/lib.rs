//! `sensor_models`: sensor descriptions, coverage tests and the sensor directory.

pub mod directory;
pub mod sensor;

pub use directory::SensorDirectory;
pub use sensor::{Sensor, SensorId, SensorKind};
