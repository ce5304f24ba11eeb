//! `drtrack` CLI: scenario runs, replay of recorded logs, track export.

mod runner;
mod sink;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use runner::{run_threaded, RunSummary, TickOptions};
use sim::replay::{load_replay, save_replay, ReplayLog};
use sim::scenarios::{Scenario, ScenarioKind};
use sim::ReplaySource;
use sink::{JsonLinesSink, NullSink};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracker_core::{Pipeline, Snapshot, TrackSink, TrackerConfig};

#[derive(Parser)]
#[command(name = "drtrack", about = "Detection-report tracker CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a named scenario and track it on a live clock.
    RunScenario {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Also save the generated replay log
        #[arg(long)]
        save_replay: Option<PathBuf>,
        /// Simulated seconds per wall-clock second (default: as fast as possible)
        #[arg(long)]
        speed: Option<f64>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Load and track a previously recorded log.
    Replay {
        /// Path to replay JSON file
        input: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Tracker configuration (JSON); missing fields take their defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write track rows of every cycle as JSON lines
    #[arg(long)]
    output: Option<PathBuf>,
    /// Write the run summary as JSON
    #[arg(long)]
    summary: Option<PathBuf>,
    /// Simulated seconds between tracking cycles
    #[arg(long, default_value_t = 1.0)]
    tick: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunScenario {
            scenario,
            seed,
            save_replay: save_path,
            speed,
            common,
        } => {
            let scenario = Scenario::build(scenario, seed);
            println!(
                "Generating scenario '{}' (seed={}, duration={:.0}s)...",
                scenario.name, seed, scenario.duration
            );
            let log = scenario.record();
            if let Some(rpath) = save_path.as_deref() {
                save_replay(&log, rpath)?;
                println!("Replay saved to {}", rpath.display());
            }
            track_log(&log, &common, speed)?;
        }
        Commands::Replay { input, common } => {
            let log = load_replay(&input)
                .with_context(|| format!("loading replay {}", input.display()))?;
            track_log(&log, &common, None)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig> {
    let Some(path) = path else {
        return Ok(TrackerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn track_log(log: &ReplayLog, common: &CommonArgs, speed: Option<f64>) -> Result<()> {
    let config = load_config(common.config.as_deref())?;
    info!(?config, "tracker configuration");

    let sink: Box<dyn TrackSink + Send> = match common.output.as_deref() {
        Some(path) => Box::new(
            JsonLinesSink::create(path)
                .with_context(|| format!("creating output {}", path.display()))?,
        ),
        None => Box::new(NullSink),
    };

    // Run until the last upload has been released and consumed
    let opts = TickOptions {
        tick: common.tick,
        end_time: (log.last_upload_time() / common.tick).ceil() * common.tick + common.tick,
        speed,
        poll: Duration::from_millis(20),
    };

    println!(
        "Tracking '{}' ({} reports, {} sensors)...",
        log.scenario_name,
        log.reports.len(),
        log.sensors.len()
    );
    let pipeline = Pipeline::new(config, &log.sensor_directory());
    let (summary, last) = run_threaded(pipeline, ReplaySource::from_log(log), sink, opts)?;

    print_summary(&summary, last.as_ref());
    if let Some(path) = common.output.as_deref() {
        println!("Track rows saved to {}", path.display());
    }
    if let Some(path) = common.summary.as_deref() {
        let json = serde_json::json!({
            "scenario": log.scenario_name,
            "seed": log.seed,
            "run": summary,
        });
        std::fs::write(path, serde_json::to_string_pretty(&json)?)?;
        println!("Summary saved to {}", path.display());
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, last: Option<&Snapshot>) {
    println!(
        "Done: {} cycles, {} reports, {} associated, {} births, {} expired, elapsed={:.2}s",
        summary.cycles,
        summary.reports,
        summary.associated,
        summary.births,
        summary.expired,
        summary.elapsed_s,
    );
    println!(
        "Tracks: {} at the end, {} at most",
        summary.final_tracks, summary.max_tracks
    );
    if let Some(snap) = last {
        for row in snap.rows() {
            println!(
                "  {}  lon={:.5} lat={:.5}  v=({:+.5}, {:+.5})  refreshed={}",
                row.id, row.lon, row.lat, row.lon_velocity, row.lat_velocity, row.refresh_time
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        std::fs::write(&path, r#"{ "ttl": 10.0, "dr_rate_threshold": 0.5 }"#).unwrap();
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.ttl, 10.0);
        assert_eq!(cfg.dr_rate_threshold, 0.5);
        assert_eq!(cfg.alignment_dt, TrackerConfig::default().alignment_dt);
    }

    #[test]
    fn missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.json"))).is_err());
        assert_eq!(load_config(None).unwrap(), TrackerConfig::default());
    }

    #[test]
    fn cli_parses_common_flags() {
        let cli = Cli::try_parse_from([
            "drtrack",
            "run-scenario",
            "manhattan",
            "--seed",
            "7",
            "--tick",
            "0.5",
            "--output",
            "rows.jsonl",
        ])
        .unwrap();
        let Commands::RunScenario {
            scenario,
            seed,
            common,
            ..
        } = cli.command
        else {
            panic!("expected run-scenario");
        };
        assert_eq!(scenario, ScenarioKind::Manhattan);
        assert_eq!(seed, 7);
        assert_eq!(common.tick, 0.5);
        assert_eq!(common.output, Some(PathBuf::from("rows.jsonl")));
    }
}
