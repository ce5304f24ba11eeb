use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sensor_models::{Sensor, SensorDirectory};
use tracker_core::pipeline::{Pipeline, TrackerConfig};
use tracker_core::report::DetectionReport;
use tracker_core::source::PagedReportSource;
use tracker_core::types::SensorId;

fn make_reports(n: usize, t: f64, first_id: u64) -> Vec<DetectionReport> {
    (0..n)
        .map(|i| {
            let angle = i as f64 * std::f64::consts::TAU / n as f64;
            let r = 10.0_f64;
            DetectionReport::new(
                first_id + i as u64,
                SensorId((i % 8) as u32),
                r * angle.cos() + 0.001 * t,
                r * angle.sin(),
                0.0,
                t,
            )
        })
        .collect()
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let sensors: SensorDirectory = (0..8)
        .map(|i| Sensor::camera(i, 0.0, 0.0, 0.0, 20.0))
        .collect();

    for n in [50, 200, 500] {
        group.bench_function(format!("{n}_targets"), |b| {
            b.iter(|| {
                let mut pipeline = Pipeline::new(TrackerConfig::default(), &sensors);
                // Warm up with one cycle to create tracks
                let mut src: PagedReportSource = make_reports(n, 0.0, 0).into_iter().collect();
                pipeline.compute_state(&mut src, None).ok();
                // Measure a full cycle with established tracks
                let mut src: PagedReportSource =
                    make_reports(n, 1.0, n as u64).into_iter().collect();
                black_box(pipeline.compute_state(&mut src, None).ok());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
