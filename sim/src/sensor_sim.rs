//! Camera detection simulator.
//!
//! Generates detection reports with:
//! - Uniform position noise
//! - Miss probability (1 - P_D)
//! - Occasional plate misreads
//! - Poisson clutter (spurious detections inside the coverage sphere)
//! - A fixed upload latency between capture and availability

use crate::target::Target;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use sensor_models::Sensor;
use serde::{Deserialize, Serialize};
use tracker_core::{DetectionReport, Feature};

/// Capture characteristics of one simulated camera.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraParams {
    /// Seconds between captures
    pub scan_interval: f64,
    pub p_detection: f64,
    /// Half-width of the uniform position error (lon/lat units)
    pub position_noise: f64,
    /// Half-width of the uniform error on each colour channel (0..255 scale)
    pub color_noise: f64,
    /// Whether the camera reads plates at all
    pub reads_plates: bool,
    /// Probability that one plate character is misread
    pub plate_error_rate: f64,
    /// Seconds between capture and upload
    pub upload_latency: f64,
    /// Mean number of spurious reports per capture
    pub lambda_clutter: f64,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            scan_interval: 1.0,
            p_detection: 0.95,
            position_noise: 5e-5,
            color_noise: 8.0,
            reads_plates: true,
            plate_error_rate: 0.05,
            upload_latency: 0.3,
            lambda_clutter: 0.0,
        }
    }
}

/// One configured camera in the simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimCamera {
    pub sensor: Sensor,
    pub params: CameraParams,
    /// Next scheduled capture time
    pub next_scan_time: f64,
}

impl SimCamera {
    pub fn new(sensor: Sensor, params: CameraParams) -> Self {
        Self {
            sensor,
            params,
            next_scan_time: 0.0,
        }
    }

    pub fn should_scan(&self, t: f64) -> bool {
        t >= self.next_scan_time
    }

    pub fn advance_schedule(&mut self) {
        self.next_scan_time += self.params.scan_interval;
    }
}

/// Generates detection reports from a set of vehicles.
pub struct CameraSimulator {
    pub cameras: Vec<SimCamera>,
    rng: ChaCha8Rng,
    next_dr_id: u64,
}

impl CameraSimulator {
    pub fn new(cameras: Vec<SimCamera>, seed: u64) -> Self {
        Self {
            cameras,
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_dr_id: 1,
        }
    }

    /// Reports of every camera whose capture is due at or before `sim_time`.
    pub fn generate_reports(&mut self, targets: &[Target], sim_time: f64) -> Vec<DetectionReport> {
        let mut out = Vec::new();

        for cam in &mut self.cameras {
            if !cam.should_scan(sim_time) {
                continue;
            }
            let scan_time = cam.next_scan_time;
            cam.advance_schedule();
            let p = &cam.params;
            let upload_time = scan_time + p.upload_latency;

            for target in targets {
                if !target.is_active(scan_time) {
                    continue;
                }
                let (lon, lat, mos) = target.position();
                if !cam.sensor.is_in_range(lon, lat, mos) {
                    continue;
                }
                if self.rng.gen::<f64>() > p.p_detection {
                    continue;
                }

                let lon = lon + jitter(&mut self.rng, p.position_noise);
                let lat = lat + jitter(&mut self.rng, p.position_noise);
                let [r, g, b] = target
                    .color
                    .map(|c| (c + jitter(&mut self.rng, p.color_noise)).clamp(0.0, 255.0));

                let mut dr = DetectionReport::new(
                    self.next_dr_id,
                    cam.sensor.id,
                    lon,
                    lat,
                    mos,
                    scan_time,
                )
                .with_upload_time(upload_time)
                .with_feature(Feature::color(r, g, b));
                if p.reads_plates {
                    let plate = read_plate(&mut self.rng, &target.plate, p.plate_error_rate);
                    dr = dr.with_feature(Feature::plate(plate));
                }
                self.next_dr_id += 1;
                out.push(dr);
            }

            let n_clutter = poisson(&mut self.rng, p.lambda_clutter);
            for _ in 0..n_clutter {
                let s = &cam.sensor;
                let r = s.range * self.rng.gen::<f64>().sqrt();
                let az = self.rng.gen::<f64>() * std::f64::consts::TAU;
                let dr = DetectionReport::new(
                    self.next_dr_id,
                    s.id,
                    s.lon + r * az.cos(),
                    s.lat + r * az.sin(),
                    s.mos,
                    scan_time,
                )
                .with_upload_time(upload_time);
                self.next_dr_id += 1;
                out.push(dr);
            }
        }

        out
    }
}

/// Uniform sample in `[-half_width, half_width]`.
fn jitter(rng: &mut ChaCha8Rng, half_width: f64) -> f64 {
    (rng.gen::<f64>() * 2.0 - 1.0) * half_width
}

/// Replace one character with a random digit with probability `error_rate`.
fn read_plate(rng: &mut ChaCha8Rng, plate: &str, error_rate: f64) -> String {
    let mut chars: Vec<char> = plate.chars().collect();
    if chars.is_empty() || rng.gen::<f64>() >= error_rate {
        return plate.to_owned();
    }
    let pos = rng.gen_range(0..chars.len());
    let digit = rng.gen_range(0..10u32);
    chars[pos] = char::from_digit(digit, 10).unwrap_or('0');
    chars.into_iter().collect()
}

/// Knuth's product-of-uniforms sampler, capped at 50 events.
fn poisson(rng: &mut ChaCha8Rng, lambda: f64) -> usize {
    if lambda <= 0.0 {
        return 0;
    }
    let threshold = (-lambda).exp();
    let mut n = 0usize;
    let mut prod = rng.gen::<f64>();
    while prod > threshold && n < 50 {
        prod *= rng.gen::<f64>();
        n += 1;
    }
    n
}
