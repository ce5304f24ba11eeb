//! Replay: serialize/deserialize recorded runs, and feed them back to the
//! tracker as if the reports were arriving live.

use crate::target::Target;
use sensor_models::{Sensor, SensorDirectory};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracker_core::{BoxError, DetectionReport, PagedReportSource, ReportSource};

/// A full recorded simulation log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayLog {
    pub scenario_name: String,
    pub seed: u64,
    pub duration: f64,
    /// Every sensor that produced reports
    pub sensors: Vec<Sensor>,
    /// All reports in capture order
    pub reports: Vec<DetectionReport>,
    /// Ground-truth vehicle states, one frame per simulator step
    pub ground_truth: Vec<GroundTruthFrame>,
}

impl ReplayLog {
    pub fn sensor_directory(&self) -> SensorDirectory {
        self.sensors.iter().cloned().collect()
    }

    /// Latest upload time in the log, 0 when empty.
    pub fn last_upload_time(&self) -> f64 {
        self.reports
            .iter()
            .map(|d| d.upload_time)
            .fold(0.0, f64::max)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroundTruthFrame {
    pub time: f64,
    pub vehicles: Vec<VehicleState>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub id: u64,
    pub lon: f64,
    pub lat: f64,
    pub mos: f64,
}

impl From<&Target> for VehicleState {
    fn from(t: &Target) -> Self {
        let (lon, lat, mos) = t.position();
        Self {
            id: t.id,
            lon,
            lat,
            mos,
        }
    }
}

/// Save a replay log to a JSON file.
pub fn save_replay(log: &ReplayLog, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, log)?;
    Ok(())
}

/// Load a replay log from a JSON file.
pub fn load_replay(path: &Path) -> anyhow::Result<ReplayLog> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let log: ReplayLog = serde_json::from_reader(reader)?;
    Ok(log)
}

// ---------------------------------------------------------------------------
// Time-released source
// ---------------------------------------------------------------------------

/// Report source over a recorded log that only hands out reports whose
/// upload time has passed the runner's clock.
///
/// The runner moves the clock with [`advance_to`](Self::advance_to) before
/// each cycle; released reports are then paged in sensor-time order.
#[derive(Clone, Debug)]
pub struct ReplaySource {
    /// Not yet uploaded, ascending upload time
    pending: VecDeque<DetectionReport>,
    released: PagedReportSource,
    clock: f64,
}

impl ReplaySource {
    pub fn new(reports: impl IntoIterator<Item = DetectionReport>) -> Self {
        let mut pending: Vec<DetectionReport> = reports.into_iter().collect();
        pending.sort_by(|a, b| {
            a.upload_time
                .total_cmp(&b.upload_time)
                .then_with(|| a.cmp(b))
        });
        Self {
            pending: pending.into(),
            released: PagedReportSource::default(),
            clock: f64::NEG_INFINITY,
        }
    }

    pub fn from_log(log: &ReplayLog) -> Self {
        Self::new(log.reports.iter().cloned())
    }

    /// Move the clock forward and release everything uploaded by `t`.
    /// A clock never moves backwards. Returns the number of reports released.
    pub fn advance_to(&mut self, t: f64) -> usize {
        self.clock = self.clock.max(t);
        let mut due = Vec::new();
        while self
            .pending
            .front()
            .is_some_and(|d| d.upload_time <= self.clock)
        {
            if let Some(dr) = self.pending.pop_front() {
                due.push(dr);
            }
        }
        let n = due.len();
        self.released.push(due);
        n
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Reports not yet uploaded.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// True once every report has been released and handed out.
    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty() && self.released.pending() == 0
    }
}

impl ReportSource for ReplaySource {
    fn next_batch(&mut self) -> Result<Vec<DetectionReport>, BoxError> {
        self.released.next_batch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{Scenario, ScenarioKind};
    use tracker_core::SensorId;

    fn dr(id: u64, sensor_time: f64, upload_time: f64) -> DetectionReport {
        DetectionReport::new(id, SensorId(1), 0.0, 0.0, 0.0, sensor_time)
            .with_upload_time(upload_time)
    }

    fn drain(src: &mut ReplaySource) -> Vec<u64> {
        let mut ids = Vec::new();
        loop {
            let page = src.next_batch().unwrap();
            if page.is_empty() {
                break;
            }
            ids.extend(page.iter().map(|d| d.dr_id));
        }
        ids
    }

    #[test]
    fn releases_by_upload_time() {
        let mut src = ReplaySource::new(vec![dr(1, 0.0, 2.5), dr(2, 1.0, 1.2), dr(3, 1.5, 4.0)]);
        assert!(drain(&mut src).is_empty());
        assert_eq!(src.advance_to(2.0), 1);
        assert_eq!(drain(&mut src), vec![2]);
        assert_eq!(src.advance_to(3.0), 1);
        assert_eq!(drain(&mut src), vec![1]);
        assert_eq!(src.pending(), 1);
        assert!(!src.is_exhausted());
        src.advance_to(10.0);
        assert_eq!(drain(&mut src), vec![3]);
        assert!(src.is_exhausted());
    }

    #[test]
    fn clock_does_not_go_back() {
        let mut src = ReplaySource::new(vec![dr(1, 0.0, 5.0)]);
        src.advance_to(6.0);
        src.advance_to(1.0);
        assert_eq!(src.clock(), 6.0);
        assert_eq!(drain(&mut src), vec![1]);
    }

    #[test]
    fn released_pages_follow_sensor_time() {
        // late upload of an early capture still comes out first
        let mut src = ReplaySource::new(vec![dr(1, 3.0, 3.1), dr(2, 1.0, 3.5)]);
        src.advance_to(4.0);
        assert_eq!(drain(&mut src), vec![2, 1]);
    }

    #[test]
    fn save_load_round_trip() {
        let log = Scenario::build(ScenarioKind::Simple, 11).record();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("simple.json");
        save_replay(&log, &path).unwrap();
        let back = load_replay(&path).unwrap();
        assert_eq!(back.scenario_name, "simple");
        assert_eq!(back.seed, 11);
        assert_eq!(back.sensors, log.sensors);
        assert_eq!(back.reports.len(), log.reports.len());
        assert_eq!(back.sensor_directory().len(), 2);
        assert!((back.last_upload_time() - log.last_upload_time()).abs() < 1e-9);
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_replay(&dir.path().join("nope.json")).is_err());
    }
}
