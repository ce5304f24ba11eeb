//! End-to-end: generated scenarios replayed through the tracking pipeline on
//! a one-second clock.

use sim::{ReplayLog, ReplaySource, Scenario, ScenarioKind};
use tracker_core::{MemorySink, Pipeline, TrackerConfig};

/// Tick the pipeline from t = 1 to `end`, returning the live track count
/// after every cycle.
fn run(log: &ReplayLog, end: f64, sink: &mut MemorySink) -> (Pipeline, Vec<(f64, usize)>, usize) {
    let mut pipeline = Pipeline::new(TrackerConfig::default(), &log.sensor_directory());
    let mut source = ReplaySource::from_log(log);
    let mut counts = Vec::new();
    let mut consumed = 0;
    let mut clock = 1.0;
    while clock <= end {
        source.advance_to(clock);
        let out = pipeline
            .run_cycle(&mut source, sink, Some(clock))
            .expect("cycle");
        consumed += out.stats.reports;
        counts.push((clock, out.snapshot.len()));
        clock += 1.0;
    }
    (pipeline, counts, consumed)
}

fn count_at(counts: &[(f64, usize)], t: f64) -> usize {
    counts
        .iter()
        .find(|(c, _)| *c == t)
        .map(|(_, n)| *n)
        .unwrap_or_default()
}

#[test]
fn simple_scenario_keeps_one_track_per_vehicle() {
    let log = Scenario::build(ScenarioKind::Simple, 42).record();
    let mut sink = MemorySink::default();
    let (pipeline, counts, consumed) = run(&log, log.duration + 1.0, &mut sink);

    assert_eq!(consumed, log.reports.len());
    assert_eq!(count_at(&counts, 10.0), 3);
    // vehicle 2 left at t = 20; its track is gone once the TTL has passed
    assert_eq!(count_at(&counts, log.duration + 1.0), 2);
    assert_eq!(pipeline.cycle() as usize, counts.len());
    assert_eq!(sink.cycles.len(), counts.len());

    // final estimates sit on the remaining vehicles
    let truth = log.ground_truth.last().expect("ground truth");
    let rows = sink.cycles.last().expect("rows");
    for row in rows {
        let nearest = truth
            .vehicles
            .iter()
            .map(|v| (v.lon - row.lon).hypot(v.lat - row.lat))
            .fold(f64::INFINITY, f64::min);
        assert!(nearest < 0.1, "track {} is {nearest} away from any vehicle", row.id);
        assert!(row.refresh_time >= log.duration as i64 - 3);
    }
}

#[test]
fn everything_expires_after_the_last_upload() {
    let log = Scenario::build(ScenarioKind::Simple, 7).record();
    let mut sink = MemorySink::default();
    let end = log.last_upload_time().ceil() + 5.0;
    let (pipeline, counts, _) = run(&log, end, &mut sink);
    assert!(counts.iter().any(|(_, n)| *n > 0));
    assert!(pipeline.tracks().is_empty());
    assert_eq!(pipeline.snapshot().map(|s| s.len()), Some(0));
}

#[test]
fn manhattan_run_consumes_every_report() {
    let log = Scenario::build(ScenarioKind::Manhattan, 3).record();
    let mut sink = MemorySink::default();
    let end = log.last_upload_time().ceil() + 1.0;
    let (_, counts, consumed) = run(&log, end, &mut sink);

    assert_eq!(consumed, log.reports.len());
    assert!(counts.iter().any(|(_, n)| *n > 0));
    for rows in &sink.cycles {
        let mut ids: Vec<_> = rows.iter().map(|r| r.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), rows.len());
    }
}
