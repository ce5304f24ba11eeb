//! Pipeline orchestrator: the full tracking cycle.
//!
//! # Processing steps per cycle
//! 1. Pull report pages from the source until an empty page
//! 2. For each page, align reports in time and for every aligned group:
//!    a. Split it into candidate groups by sensor neighbourhood
//!    b. Associate candidate groups with existing tracks (greedy)
//!    c. Cluster what is left and initialise new tracks
//!    d. Fuse associated reports, then the reports of the new tracks
//! 3. Expire tracks past their TTL
//! 4. Publish a snapshot (and write rows to a sink in `run_cycle`)

use crate::{
    alignment::Alignment,
    association::DataAssociator,
    candidate::{CandidateSelector, GroupingMode},
    comparator::{build_comparator, build_list_comparator, ComparatorKind, GradeWeights, ListComparatorKind},
    error::TrackerError,
    fusion::fuse_reports,
    kf::{KalmanFilter, KalmanModelConfig},
    report::DetectionReport,
    snapshot::{Snapshot, SnapshotBuffer},
    source::{ReportSource, TrackSink},
    track::Track,
    track_manager::{TrackManager, TrackManagerConfig},
};
use sensor_models::SensorDirectory;
use serde::{Deserialize, Serialize};
use std::{ops::AddAssign, sync::Arc, time::Instant};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the tracking engine. Read once at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Max sensor-time spread within an aligned group (s)
    pub alignment_dt: f64,
    /// Minimum per-report rate to match a track
    pub dr_rate_threshold: f64,
    /// Clamp for positional closeness `1 / distance`
    pub max_position_rate: f64,
    /// Track time-to-live since last refresh (s)
    pub ttl: f64,
    pub comparator: ComparatorKind,
    pub list_comparator: ListComparatorKind,
    /// Feature name → weight; names not listed weigh 0
    pub feature_weights: GradeWeights,
    pub grouping: GroupingMode,
    pub track_manager: TrackManagerConfig,
    pub filter: KalmanModelConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            alignment_dt: 1.0,
            dr_rate_threshold: 0.3,
            max_position_rate: 10.0,
            ttl: 3.0,
            comparator: ComparatorKind::Or,
            list_comparator: ListComparatorKind::Or,
            feature_weights: GradeWeights::new(),
            grouping: GroupingMode::Single,
            track_manager: TrackManagerConfig::default(),
            filter: KalmanModelConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Counters for one cycle (or one page of it).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub reports: usize,
    pub aligned_groups: usize,
    pub candidate_groups: usize,
    /// Reports fused into existing tracks
    pub associated: usize,
    /// Tracks created
    pub births: usize,
    /// Tracks removed by TTL
    pub expired: usize,
}

impl AddAssign for CycleStats {
    fn add_assign(&mut self, rhs: Self) {
        self.reports += rhs.reports;
        self.aligned_groups += rhs.aligned_groups;
        self.candidate_groups += rhs.candidate_groups;
        self.associated += rhs.associated;
        self.births += rhs.births;
        self.expired += rhs.expired;
    }
}

/// Result of one completed cycle.
#[derive(Clone, Debug)]
pub struct CycleOutput {
    pub snapshot: Snapshot,
    pub stats: CycleStats,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The tracking engine. Holds the live tracks and every per-cycle stage.
pub struct Pipeline {
    pub config: TrackerConfig,
    alignment: Alignment,
    selector: CandidateSelector,
    associator: DataAssociator,
    track_manager: TrackManager,
    filter_prototype: KalmanFilter,
    buffer: Arc<SnapshotBuffer>,
    cycle: u64,
}

impl Pipeline {
    pub fn new(config: TrackerConfig, sensors: &SensorDirectory) -> Self {
        let associator = DataAssociator::new(
            build_comparator(
                config.comparator,
                config.feature_weights.clone(),
                config.max_position_rate,
            ),
            build_list_comparator(config.list_comparator),
            config.dr_rate_threshold,
        );
        Self {
            alignment: Alignment::new(config.alignment_dt),
            selector: CandidateSelector::new(config.grouping, sensors),
            associator,
            track_manager: TrackManager::new(config.track_manager.clone()),
            filter_prototype: KalmanFilter::new(&config.filter),
            buffer: Arc::new(SnapshotBuffer::new()),
            cycle: 0,
            config,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        self.track_manager.tracks()
    }

    pub fn track_manager(&self) -> &TrackManager {
        &self.track_manager
    }

    /// Number of completed cycles.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Last published snapshot.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.buffer.latest()
    }

    /// Shared handle for readers on other threads.
    pub fn snapshot_buffer(&self) -> Arc<SnapshotBuffer> {
        Arc::clone(&self.buffer)
    }

    /// Run one page of reports through alignment, grouping, association,
    /// initialisation and fusion.
    ///
    /// On error the tracks are restored to their state before the page and
    /// the page's remaining reports are dropped.
    pub fn process_reports(
        &mut self,
        reports: Vec<DetectionReport>,
    ) -> Result<CycleStats, TrackerError> {
        let checkpoint = self.track_manager.clone();
        let res = self.process_page(reports);
        if res.is_err() {
            self.rollback(checkpoint);
        }
        res
    }

    fn process_page(&mut self, reports: Vec<DetectionReport>) -> Result<CycleStats, TrackerError> {
        let mut stats = CycleStats {
            reports: reports.len(),
            ..Default::default()
        };
        self.alignment.load(reports);

        loop {
            let group = self.alignment.next_group();
            if group.is_empty() {
                break;
            }
            stats.aligned_groups += 1;
            debug!(
                size = group.len(),
                first = group.first().map(|d| d.sensor_time),
                "aligned group"
            );

            let candidates = self.selector.select(group);
            stats.candidate_groups += candidates.len();

            self.associator.set_input(candidates);
            let matched = self
                .associator
                .drs_for_tracks(self.track_manager.tracks_mut())
                .clone();
            let rest = self.associator.not_associated(self.track_manager.tracks_mut());

            let born = self
                .track_manager
                .initialize_tracks(&rest, &self.filter_prototype);
            stats.births += born.len();

            stats.associated += fuse_reports(self.track_manager.tracks_mut(), &matched)?;
            fuse_reports(self.track_manager.tracks_mut(), &born)?;
        }
        Ok(stats)
    }

    /// Drain `source`, expire stale tracks and publish a snapshot.
    ///
    /// With `now == None` the latest refresh time among the tracks stands in
    /// for the current time.
    pub fn compute_state<S>(
        &mut self,
        source: &mut S,
        now: Option<f64>,
    ) -> Result<CycleOutput, TrackerError>
    where
        S: ReportSource + ?Sized,
    {
        let start = Instant::now();
        let stats = match self.drain(source, now) {
            Ok(stats) => stats,
            Err(e) => {
                warn!(cycle = self.cycle + 1, error = %e, "cycle aborted");
                return Err(e);
            }
        };

        self.cycle += 1;
        let snapshot = Snapshot::new(self.cycle, self.track_manager.tracks_snapshot());
        self.buffer.put(snapshot.clone());

        info!(
            cycle = self.cycle,
            reports = stats.reports,
            groups = stats.aligned_groups,
            associated = stats.associated,
            births = stats.births,
            expired = stats.expired,
            tracks = snapshot.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "cycle complete"
        );
        Ok(CycleOutput { snapshot, stats })
    }

    /// [`compute_state`](Self::compute_state), then write one row per track
    /// to `sink`.
    pub fn run_cycle<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        now: Option<f64>,
    ) -> Result<CycleOutput, TrackerError>
    where
        S: ReportSource + ?Sized,
        K: TrackSink + ?Sized,
    {
        let out = self.compute_state(source, now)?;
        sink.store(&out.snapshot.rows()).map_err(|e| {
            warn!(cycle = self.cycle, error = %e, "track sink failed");
            TrackerError::Sink(e)
        })?;
        Ok(out)
    }

    /// Undo a failed page or cycle.
    fn rollback(&mut self, checkpoint: TrackManager) {
        let dropped = self.alignment.len();
        self.alignment.clear();
        self.track_manager = checkpoint;
        debug!(dropped, tracks = self.track_manager.len(), "state rolled back");
    }

    fn drain<S>(&mut self, source: &mut S, now: Option<f64>) -> Result<CycleStats, TrackerError>
    where
        S: ReportSource + ?Sized,
    {
        // Pages already applied in this cycle are undone if a later one fails
        let checkpoint = self.track_manager.clone();
        let mut stats = CycleStats::default();
        loop {
            let page = match source.next_batch() {
                Ok(page) => page,
                Err(e) => {
                    self.rollback(checkpoint);
                    return Err(TrackerError::Source(e));
                }
            };
            if page.is_empty() {
                break;
            }
            match self.process_page(page) {
                Ok(page_stats) => stats += page_stats,
                Err(e) => {
                    self.rollback(checkpoint);
                    return Err(e);
                }
            }
        }

        let ttl = self.config.ttl;
        stats.expired = match now {
            Some(t) => self.track_manager.remove_expired_tracks(t, ttl),
            None => self.track_manager.remove_expired_tracks_latest(ttl),
        };
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BoxError, FilterError};
    use crate::source::{MemorySink, PagedReportSource};
    use crate::types::SensorId;
    use approx::assert_abs_diff_eq;
    use sensor_models::Sensor;

    fn dr(id: u64, lon: f64, lat: f64, t: f64) -> DetectionReport {
        DetectionReport::new(id, SensorId(1), lon, lat, 0.0, t)
    }

    fn pipeline(config: TrackerConfig) -> Pipeline {
        let sensors = SensorDirectory::new(vec![Sensor::camera(1, 0.5, 0.5, 0.0, 5.0)]);
        Pipeline::new(config, &sensors)
    }

    struct FailingSource;

    impl ReportSource for FailingSource {
        fn next_batch(&mut self) -> Result<Vec<DetectionReport>, BoxError> {
            Err("connection reset".into())
        }
    }

    struct FailingSink;

    impl TrackSink for FailingSink {
        fn store(&mut self, _rows: &[crate::snapshot::TrackRow]) -> Result<(), BoxError> {
            Err("disk full".into())
        }
    }

    #[test]
    fn births_then_association() {
        let mut p = pipeline(TrackerConfig::default());

        let mut src: PagedReportSource = vec![dr(1, 0.0, 0.0, 0.0), dr(2, 1.0, 1.0, 0.0)]
            .into_iter()
            .collect();
        let out = p.compute_state(&mut src, Some(0.0)).unwrap();
        assert_eq!(out.stats.births, 2);
        assert_eq!(out.stats.associated, 0);
        assert_eq!(out.snapshot.cycle, 1);
        assert_eq!(out.snapshot.len(), 2);

        let mut src: PagedReportSource = vec![dr(3, 0.01, 0.0, 1.0), dr(4, 1.01, 1.0, 1.0)]
            .into_iter()
            .collect();
        let out = p.compute_state(&mut src, Some(1.0)).unwrap();
        assert_eq!(out.stats.births, 0);
        assert_eq!(out.stats.associated, 2);
        assert_eq!(p.tracks().len(), 2);
        assert!(p.tracks().iter().all(|t| t.refresh_time() == 1.0));

        let moved = p.tracks().iter().find(|t| t.lat < 0.5).unwrap();
        assert!(moved.lon > 0.0 && moved.lon < 0.01);
    }

    #[test]
    fn ttl_eviction_uses_clock() {
        let mut p = pipeline(TrackerConfig::default());
        let mut src: PagedReportSource = vec![dr(1, 0.0, 0.0, 10.0)].into_iter().collect();
        p.compute_state(&mut src, None).unwrap();
        assert_eq!(p.tracks().len(), 1);

        // latest-refresh overload never removes the freshest track
        let out = p.compute_state(&mut PagedReportSource::default(), None).unwrap();
        assert_eq!(out.stats.expired, 0);

        // exactly TTL is still valid
        let out = p.compute_state(&mut PagedReportSource::default(), Some(13.0)).unwrap();
        assert_eq!(out.stats.expired, 0);
        let out = p.compute_state(&mut PagedReportSource::default(), Some(13.5)).unwrap();
        assert_eq!(out.stats.expired, 1);
        assert!(out.snapshot.is_empty());
        assert_eq!(p.cycle(), 4);
    }

    #[test]
    fn snapshot_published_and_rows_stored() {
        let mut p = pipeline(TrackerConfig::default());
        let buffer = p.snapshot_buffer();
        assert!(p.snapshot().is_none());

        let mut src: PagedReportSource = (0..50u64)
            .map(|i| dr(i, (i % 5) as f64, 0.0, (i / 5) as f64 * 0.1))
            .collect();
        let mut sink = MemorySink::default();
        let out = p.run_cycle(&mut src, &mut sink, None).unwrap();
        assert_eq!(out.stats.reports, 50);
        assert_eq!(sink.cycles.len(), 1);
        assert_eq!(sink.cycles[0].len(), out.snapshot.len());
        assert_eq!(buffer.latest().map(|s| s.cycle), Some(1));
        // five well separated objects
        assert_eq!(out.snapshot.len(), 5);
    }

    #[test]
    fn source_error_aborts_cycle() {
        let mut p = pipeline(TrackerConfig::default());
        let err = p.compute_state(&mut FailingSource, None).unwrap_err();
        assert!(matches!(err, TrackerError::Source(_)));
        assert_eq!(p.cycle(), 0);
        assert!(p.snapshot().is_none());
    }

    #[test]
    fn sink_error_is_reported() {
        let mut p = pipeline(TrackerConfig::default());
        let mut src = PagedReportSource::default();
        let err = p.run_cycle(&mut src, &mut FailingSink, None).unwrap_err();
        assert!(matches!(err, TrackerError::Sink(_)));
    }

    #[test]
    fn filter_error_aborts_cycle() {
        let config = TrackerConfig {
            filter: KalmanModelConfig {
                process_noise: 0.0,
                measurement_noise: 0.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut p = pipeline(config);
        let mut src: PagedReportSource = vec![dr(1, 0.0, 0.0, 0.0)].into_iter().collect();
        let err = p.compute_state(&mut src, None).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::Filter(FilterError::SingularInnovation)
        ));
    }

    #[test]
    fn filter_error_rolls_back_the_page() {
        let config = TrackerConfig {
            filter: KalmanModelConfig {
                process_noise: 0.0,
                measurement_noise: 0.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut p = pipeline(config);
        // two aligned groups; the first one fails before the second is reached
        let mut src: PagedReportSource = vec![dr(1, 0.0, 0.0, 0.0), dr(2, 3.0, 3.0, 10.0)]
            .into_iter()
            .collect();
        assert!(p.compute_state(&mut src, None).is_err());
        assert_eq!(p.alignment.len(), 0);
        assert!(p.tracks().is_empty());

        let out = p.compute_state(&mut PagedReportSource::default(), None).unwrap();
        assert_eq!(out.snapshot.cycle, 1);
        assert!(out.snapshot.is_empty());
        assert_eq!(out.stats.reports, 0);
    }

    /// Hands out one page, then fails.
    struct FlakySource {
        page: Option<Vec<DetectionReport>>,
    }

    impl ReportSource for FlakySource {
        fn next_batch(&mut self) -> Result<Vec<DetectionReport>, BoxError> {
            self.page.take().ok_or_else(|| "connection reset".into())
        }
    }

    #[test]
    fn source_error_undoes_earlier_pages_of_the_cycle() {
        let mut p = pipeline(TrackerConfig::default());
        let mut src: PagedReportSource = vec![dr(1, 0.0, 0.0, 0.0)].into_iter().collect();
        p.compute_state(&mut src, Some(0.0)).unwrap();
        let before: Vec<_> = p.tracks().iter().map(|t| (t.id, t.refresh_time())).collect();
        assert_eq!(before.len(), 1);

        let mut flaky = FlakySource {
            page: Some(vec![dr(2, 0.001, 0.0, 1.0), dr(3, 2.0, 2.0, 1.0)]),
        };
        let err = p.compute_state(&mut flaky, Some(1.0)).unwrap_err();
        assert!(matches!(err, TrackerError::Source(_)));
        let after: Vec<_> = p.tracks().iter().map(|t| (t.id, t.refresh_time())).collect();
        assert_eq!(after, before);
        assert_eq!(p.cycle(), 1);
    }

    #[test]
    fn failed_page_leaves_tracks_untouched() {
        let mut p = pipeline(TrackerConfig::default());
        p.process_reports(vec![dr(1, 0.0, 0.0, 0.0)]).unwrap();
        let id = p.tracks()[0].id;
        // the next newborn track gets a filter whose innovation is singular
        p.filter_prototype = KalmanFilter::new(&KalmanModelConfig {
            process_noise: 0.0,
            measurement_noise: 0.0,
            ..Default::default()
        });
        assert!(p.process_reports(vec![dr(2, 5.0, 5.0, 1.0)]).is_err());
        assert_eq!(p.tracks().len(), 1);
        assert_eq!(p.tracks()[0].id, id);
        assert!(p.alignment.is_empty());
    }

    #[test]
    fn neighbourhood_grouping_keeps_unknown_sensor_apart() {
        let config = TrackerConfig {
            grouping: GroupingMode::SensorNeighborhood,
            ..Default::default()
        };
        let mut p = pipeline(config);
        let reports = vec![
            dr(1, 0.0, 0.0, 0.0),
            DetectionReport::new(2, SensorId(77), 3.0, 3.0, 0.0, 0.0),
        ];
        let stats = p.process_reports(reports).unwrap();
        assert_eq!(stats.aligned_groups, 1);
        assert_eq!(stats.candidate_groups, 2);
        assert_eq!(stats.births, 2);
    }

    #[test]
    fn config_defaults_from_json() {
        let cfg: TrackerConfig = serde_json::from_str(r#"{"ttl": 5.0, "comparator": "and"}"#).unwrap();
        assert_eq!(cfg.ttl, 5.0);
        assert_eq!(cfg.comparator, ComparatorKind::And);
        assert_abs_diff_eq!(cfg.alignment_dt, 1.0);
        assert_abs_diff_eq!(cfg.track_manager.initialization_threshold, 5000.0);
        assert_abs_diff_eq!(cfg.filter.process_noise, 0.001);
    }
}
