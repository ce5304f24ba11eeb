//! Kalman filter: predict and correct steps.
//!
//! ## State vector
//! x = [lon, lat, v_lon, v_lat]ᵀ  (4-dimensional)
//!
//! ## CV Transition model
//! A = I₄ + dt * [[0₂ I₂]; [0₂ 0₂]]
//! i.e. lon += v_lon*dt, lat += v_lat*dt
//!
//! ## Observation model
//! H = [I₂ 0₂]: only the position is observed. Corrections take a vector in
//! state layout and project it through H.
//!
//! One filter instance belongs to one track. New tracks clone a configured
//! prototype, so model matrices are shared by configuration while estimates
//! evolve independently.

use crate::error::FilterError;
use crate::types::{ObsMat, ObsVec, StateCov, StateVec};
use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Model configuration
// ---------------------------------------------------------------------------

/// Configuration for the constant-velocity model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanModelConfig {
    /// Step length used in the transition matrix (one cycle)
    pub dt: f64,
    /// Diagonal of Q
    pub process_noise: f64,
    /// Diagonal of R
    pub measurement_noise: f64,
}

impl Default for KalmanModelConfig {
    fn default() -> Self {
        Self {
            dt: 1.0,
            process_noise: 0.001,
            measurement_noise: 0.001,
        }
    }
}

/// A posteriori / a priori estimates after the last step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Estimate {
    pub corrected: StateVec,
    pub corrected_cov: StateCov,
    pub predicted: StateVec,
    pub predicted_cov: StateCov,
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Linear Kalman filter over [`StateVec`].
#[derive(Clone, Debug)]
pub struct KalmanFilter {
    /// Transition A
    a: StateCov,
    /// Control input B (scalar control)
    b: StateVec,
    /// Measurement model H
    h: ObsMat,
    /// Process noise Q
    q: StateCov,
    /// Measurement noise R
    r: Matrix2<f64>,
    estimate: Option<Estimate>,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new(&KalmanModelConfig::default())
    }
}

impl KalmanFilter {
    pub fn new(config: &KalmanModelConfig) -> Self {
        Self::from_matrices(
            Self::transition_matrix(config.dt),
            StateVec::zeros(),
            Self::observation_matrix(),
            StateCov::identity() * config.process_noise,
            Matrix2::identity() * config.measurement_noise,
        )
    }

    /// Build a filter from explicit model matrices.
    pub fn from_matrices(
        a: StateCov,
        b: StateVec,
        h: ObsMat,
        q: StateCov,
        r: Matrix2<f64>,
    ) -> Self {
        Self {
            a,
            b,
            h,
            q,
            r,
            estimate: None,
        }
    }

    /// Build state transition matrix A for timestep dt.
    pub fn transition_matrix(dt: f64) -> StateCov {
        let mut a = StateCov::identity();
        a[(0, 2)] = dt;
        a[(1, 3)] = dt;
        a
    }

    /// H = [I₂ 0₂]
    pub fn observation_matrix() -> ObsMat {
        ObsMat::new(1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub fn is_initialized(&self) -> bool {
        self.estimate.is_some()
    }

    pub fn estimate(&self) -> Result<&Estimate, FilterError> {
        self.estimate.as_ref().ok_or(FilterError::Uninitialized)
    }

    /// Set the a posteriori state and `diag(variance)`, then run one predict.
    pub fn initialize(&mut self, state: StateVec, variance: StateVec) -> StateVec {
        let cov = StateCov::from_diagonal(&variance);
        let (predicted, predicted_cov) = self.propagate(&state, &cov, 0.0);
        self.estimate = Some(Estimate {
            corrected: predicted,
            corrected_cov: predicted_cov,
            predicted,
            predicted_cov,
        });
        predicted
    }

    /// Predict with zero control input.
    pub fn predict(&mut self) -> Result<StateVec, FilterError> {
        self.predict_with_control(0.0)
    }

    /// x' = A·x + B·u, P' = A·P·Aᵀ + Q.
    ///
    /// Without a correction in between, the prior becomes the new posterior,
    /// so consecutive predicts keep extrapolating.
    pub fn predict_with_control(&mut self, u: f64) -> Result<StateVec, FilterError> {
        let est = self.estimate.ok_or(FilterError::Uninitialized)?;
        let (predicted, predicted_cov) = self.propagate(&est.corrected, &est.corrected_cov, u);
        self.estimate = Some(Estimate {
            corrected: predicted,
            corrected_cov: predicted_cov,
            predicted,
            predicted_cov,
        });
        Ok(predicted)
    }

    /// Correct the prediction with an observation given in state layout.
    ///
    /// K = P'·Hᵀ·(H·P'·Hᵀ + R)⁻¹, x = x' + K·(H·z − H·x'), P = (I − K·H)·P'.
    pub fn correct(&mut self, z: &StateVec) -> Result<StateVec, FilterError> {
        let est = self.estimate.ok_or(FilterError::Uninitialized)?;
        let hz: ObsVec = self.h * z;
        let innovation = hz - self.h * est.predicted;

        // Innovation covariance: S = H·P'·Hᵀ + R
        let s = self.h * est.predicted_cov * self.h.transpose() + self.r;
        let s_inv = s.lu().try_inverse().ok_or(FilterError::SingularInnovation)?;
        let k = est.predicted_cov * self.h.transpose() * s_inv;

        let corrected = est.predicted + k * innovation;
        let corrected_cov = (StateCov::identity() - k * self.h) * est.predicted_cov;
        self.estimate = Some(Estimate {
            corrected,
            corrected_cov,
            ..est
        });
        Ok(corrected)
    }

    fn propagate(&self, x: &StateVec, p: &StateCov, u: f64) -> (StateVec, StateCov) {
        let predicted = self.a * x + self.b * u;
        let predicted_cov = self.a * p * self.a.transpose() + self.q;
        (predicted, predicted_cov)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
