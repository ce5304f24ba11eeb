//! Threaded runner: the pipeline ticks on a worker thread at a fixed
//! simulated interval while the calling thread watches published snapshots.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use sim::ReplaySource;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tracker_core::{CycleOutput, Pipeline, Snapshot, TrackSink};

#[derive(Clone, Copy, Debug)]
pub struct TickOptions {
    /// Simulated seconds between cycles
    pub tick: f64,
    /// Clock of the last cycle
    pub end_time: f64,
    /// Wall-clock pacing: `Some(k)` runs k simulated seconds per real second
    pub speed: Option<f64>,
    /// How often the observer polls the snapshot buffer
    pub poll: Duration,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    pub cycles: u64,
    pub reports: usize,
    pub associated: usize,
    pub births: usize,
    pub expired: usize,
    pub max_tracks: usize,
    pub final_tracks: usize,
    pub elapsed_s: f64,
}

impl RunSummary {
    fn record(&mut self, out: &CycleOutput) {
        self.cycles += 1;
        self.reports += out.stats.reports;
        self.associated += out.stats.associated;
        self.births += out.stats.births;
        self.expired += out.stats.expired;
        self.max_tracks = self.max_tracks.max(out.snapshot.len());
        self.final_tracks = out.snapshot.len();
    }
}

/// Run `pipeline` over `source` on a worker thread and return the summary
/// together with the last snapshot seen by the observer.
pub fn run_threaded(
    pipeline: Pipeline,
    source: ReplaySource,
    sink: Box<dyn TrackSink + Send>,
    opts: TickOptions,
) -> Result<(RunSummary, Option<Snapshot>)> {
    if opts.tick.is_nan() || opts.tick <= 0.0 {
        return Err(anyhow!("tick must be positive, got {}", opts.tick));
    }
    let buffer = pipeline.snapshot_buffer();
    let worker = thread::Builder::new()
        .name("tracker".into())
        .spawn(move || tick_loop(pipeline, source, sink, opts))
        .context("spawning tracker thread")?;

    let mut last_cycle = 0;
    while !worker.is_finished() {
        if let Some(snap) = buffer.latest() {
            if snap.cycle != last_cycle {
                debug!(cycle = snap.cycle, tracks = snap.len(), "observed snapshot");
                last_cycle = snap.cycle;
            }
        }
        thread::sleep(opts.poll);
    }

    let summary = worker
        .join()
        .map_err(|_| anyhow!("tracker thread panicked"))??;
    Ok((summary, buffer.latest()))
}

fn tick_loop(
    mut pipeline: Pipeline,
    mut source: ReplaySource,
    mut sink: Box<dyn TrackSink + Send>,
    opts: TickOptions,
) -> Result<RunSummary> {
    let start = Instant::now();
    let mut summary = RunSummary::default();
    let mut n = 1u64;
    let mut clock = opts.tick;

    while clock <= opts.end_time {
        let released = source.advance_to(clock);
        let out = pipeline
            .run_cycle(&mut source, sink.as_mut(), Some(clock))
            .with_context(|| format!("cycle at t={clock:.1}"))?;
        debug!(clock, released, "tick");
        summary.record(&out);

        n += 1;
        clock = n as f64 * opts.tick;
        if let Some(speed) = opts.speed.filter(|s| *s > 0.0) {
            let deadline = start + Duration::from_secs_f64(clock / speed);
            if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
                thread::sleep(wait);
            }
        }
    }

    summary.elapsed_s = start.elapsed().as_secs_f64();
    info!(
        cycles = summary.cycles,
        reports = summary.reports,
        births = summary.births,
        final_tracks = summary.final_tracks,
        "run complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;
    use sim::{Scenario, ScenarioKind};
    use tracker_core::{MemorySink, TrackerConfig};

    fn options(end_time: f64) -> TickOptions {
        TickOptions {
            tick: 1.0,
            end_time,
            speed: None,
            poll: Duration::from_millis(1),
        }
    }

    #[test]
    fn worker_consumes_whole_log() {
        let log = Scenario::build(ScenarioKind::Simple, 42).record();
        let pipeline = Pipeline::new(TrackerConfig::default(), &log.sensor_directory());
        let end = log.last_upload_time().ceil() + 1.0;
        let (summary, last) = run_threaded(
            pipeline,
            ReplaySource::from_log(&log),
            Box::new(NullSink),
            options(end),
        )
        .unwrap();
        assert_eq!(summary.reports, log.reports.len());
        assert_eq!(summary.cycles, end as u64);
        assert!(summary.births >= 3);
        assert_eq!(last.map(|s| s.cycle), Some(summary.cycles));
    }

    #[test]
    fn rejects_non_positive_tick() {
        let pipeline = Pipeline::new(TrackerConfig::default(), &Default::default());
        let mut opts = options(10.0);
        opts.tick = 0.0;
        let res = run_threaded(
            pipeline,
            ReplaySource::new(Vec::new()),
            Box::new(MemorySink::default()),
            opts,
        );
        assert!(res.is_err());
    }
}
