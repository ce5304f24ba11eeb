//! Sensor directory: the static set of sensors known for a run.
//!
//! Built once from whatever adapter knows the deployment (a replay log, a
//! config file, a database) and handed by reference to the stages that need
//! sensor geometry. Not reloaded while a run is in progress.

use crate::sensor::{Sensor, SensorId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SensorDirectory {
    sensors: BTreeMap<SensorId, Sensor>,
}

impl SensorDirectory {
    pub fn new(sensors: impl IntoIterator<Item = Sensor>) -> Self {
        Self {
            sensors: sensors.into_iter().map(|s| (s.id, s)).collect(),
        }
    }

    /// Register (or replace) a sensor description.
    pub fn insert(&mut self, sensor: Sensor) -> Option<Sensor> {
        self.sensors.insert(sensor.id, sensor)
    }

    pub fn get(&self, id: SensorId) -> Option<&Sensor> {
        self.sensors.get(&id)
    }

    /// All sensors, ordered by id.
    pub fn sensors(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.values()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

impl FromIterator<Sensor> for SensorDirectory {
    fn from_iter<I: IntoIterator<Item = Sensor>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_ordering() {
        let dir: SensorDirectory = vec![
            Sensor::camera(3, 0.0, 0.0, 0.0, 1.0),
            Sensor::camera(1, 5.0, 0.0, 0.0, 1.0),
        ]
        .into_iter()
        .collect();
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.get(SensorId(1)).map(|s| s.lon), Some(5.0));
        assert!(dir.get(SensorId(2)).is_none());
        let ids: Vec<_> = dir.sensors().map(|s| s.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn insert_replaces_same_id() {
        let mut dir = SensorDirectory::default();
        assert!(dir.insert(Sensor::camera(1, 0.0, 0.0, 0.0, 1.0)).is_none());
        let old = dir.insert(Sensor::camera(1, 2.0, 0.0, 0.0, 1.0));
        assert_eq!(old.map(|s| s.lon), Some(0.0));
        assert_eq!(dir.len(), 1);
    }
}
