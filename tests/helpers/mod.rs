//! Shared toy models and reference implementations for integration tests
//!
//! The reference log-likelihoods are hand-rolled recursions kept
//! independent of the library code so the reduction tests compare against
//! something the crate does not compute itself.

#![allow(dead_code)]

use std::f64::consts::PI;

use nalgebra::{dmatrix, dvector, DMatrix, DVector};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use rbpf::{FilterError, HmmFilter, HmmModel, KalmanFilter, KalmanModel};

// ============================================================================
// Scalar density helpers
// ============================================================================

/// Log density of N(x; mean, var)
pub fn log_normal_pdf(x: f64, mean: f64, var: f64) -> f64 {
    let diff = x - mean;
    -0.5 * ((2.0 * PI * var).ln() + diff * diff / var)
}

// ============================================================================
// Reference recursions
// ============================================================================

/// Exact log-likelihood of a scalar linear-Gaussian state-space model via
/// the prediction error decomposition.
pub fn scalar_kalman_loglik(
    observations: &[f64],
    f: f64,
    q: f64,
    h: f64,
    r: f64,
    mean0: f64,
    var0: f64,
) -> f64 {
    let mut mean = mean0;
    let mut var = var0;
    let mut total = 0.0;

    for &y in observations {
        let mean_pred = f * mean;
        let var_pred = f * var * f + q;

        let innovation = y - h * mean_pred;
        let s = h * var_pred * h + r;
        let gain = var_pred * h / s;

        total += log_normal_pdf(innovation, 0.0, s);
        mean = mean_pred + gain * innovation;
        var = (1.0 - gain * h) * var_pred;
    }
    total
}

/// Exact log-likelihood of a discrete HMM via the forward algorithm in
/// probability domain with per-step normalization.
pub fn hmm_forward_loglik(
    observations: &[f64],
    initial: &[f64],
    transition: &[[f64; 2]; 2],
    emission: impl Fn(usize, f64) -> f64,
) -> f64 {
    let mut belief = [initial[0], initial[1]];
    let mut total = 0.0;

    for &y in observations {
        let predicted = [
            transition[0][0] * belief[0] + transition[1][0] * belief[1],
            transition[0][1] * belief[0] + transition[1][1] * belief[1],
        ];
        let unnorm = [predicted[0] * emission(0, y), predicted[1] * emission(1, y)];
        let norm = unnorm[0] + unnorm[1];
        total += norm.ln();
        belief = [unnorm[0] / norm, unnorm[1] / norm];
    }
    total
}

// ============================================================================
// Trajectory simulation
// ============================================================================

/// Simulate a scalar linear-Gaussian state-space trajectory
pub fn simulate_lgss<R: Rng>(
    rng: &mut R,
    steps: usize,
    f: f64,
    q: f64,
    h: f64,
    r: f64,
) -> Vec<f64> {
    let state_noise = Normal::new(0.0, q.sqrt()).unwrap();
    let obs_noise = Normal::new(0.0, r.sqrt()).unwrap();
    let mut state = 0.0;
    (0..steps)
        .map(|_| {
            state = f * state + state_noise.sample(rng);
            h * state + obs_noise.sample(rng)
        })
        .collect()
}

/// Simulate observations from a two-state chain with Gaussian emissions
pub fn simulate_two_state<R: Rng>(
    rng: &mut R,
    steps: usize,
    transition: &[[f64; 2]; 2],
    means: [f64; 2],
    std: f64,
) -> Vec<f64> {
    let noise = Normal::new(0.0, std).unwrap();
    let mut state = if rng.gen::<f64>() < 0.5 { 0 } else { 1 };
    (0..steps)
        .map(|_| {
            let u: f64 = rng.gen();
            state = if u < transition[state][0] { 0 } else { 1 };
            means[state] + noise.sample(rng)
        })
        .collect()
}

// ============================================================================
// d_s = 0 stub models (the sampled component is empty)
// ============================================================================

/// Scalar linear-Gaussian model with no sampled component; the RBPF
/// collapses to a bank of identical Kalman filters.
pub struct FixedLinearGaussian {
    pub f: f64,
    pub q: f64,
    pub h: f64,
    pub r: f64,
    pub mean0: f64,
    pub var0: f64,
}

impl FixedLinearGaussian {
    pub fn standard() -> Self {
        Self {
            f: 1.0,
            q: 0.1,
            h: 1.0,
            r: 1.0,
            mean0: 0.0,
            var0: 1.0,
        }
    }
}

impl KalmanModel for FixedLinearGaussian {
    fn sampled_dim(&self) -> usize {
        0
    }
    fn hidden_dim(&self) -> usize {
        1
    }
    fn obs_dim(&self) -> usize {
        1
    }
    fn sample_initial<R: Rng>(&self, _rng: &mut R, _y1: &DVector<f64>) -> DVector<f64> {
        DVector::zeros(0)
    }
    fn log_prior(&self, _x2: &DVector<f64>) -> f64 {
        0.0
    }
    fn log_initial_proposal(&self, _x2: &DVector<f64>, _y1: &DVector<f64>) -> f64 {
        0.0
    }
    fn sample_proposal<R: Rng>(
        &self,
        _rng: &mut R,
        _x2_prev: &DVector<f64>,
        _y: &DVector<f64>,
    ) -> DVector<f64> {
        DVector::zeros(0)
    }
    fn log_transition(&self, _x2: &DVector<f64>, _x2_prev: &DVector<f64>) -> f64 {
        0.0
    }
    fn log_proposal(&self, _x2: &DVector<f64>, _x2_prev: &DVector<f64>, _y: &DVector<f64>) -> f64 {
        0.0
    }
    fn initial_mean(&self, _x2_1: &DVector<f64>) -> DVector<f64> {
        dvector![self.mean0]
    }
    fn initial_covariance(&self, _x2_1: &DVector<f64>) -> DMatrix<f64> {
        dmatrix![self.var0]
    }
    fn observe(
        &self,
        filter: &mut KalmanFilter,
        y: &DVector<f64>,
        _x2: &DVector<f64>,
    ) -> Result<(), FilterError> {
        filter.advance(
            y,
            &dmatrix![self.f],
            &dmatrix![self.q],
            &dmatrix![self.h],
            &dmatrix![self.r],
        )
    }
}

/// Two-state chain with Gaussian emissions and no sampled component; the
/// RBPF collapses to a bank of identical forward filters.
pub struct FixedTwoStateChain {
    pub initial: [f64; 2],
    pub transition: [[f64; 2]; 2],
    pub means: [f64; 2],
    pub std: f64,
}

impl FixedTwoStateChain {
    pub fn standard() -> Self {
        Self {
            initial: [0.5, 0.5],
            transition: [[0.95, 0.05], [0.10, 0.90]],
            means: [-1.0, 1.0],
            std: 0.8,
        }
    }

    pub fn emission_density(&self, state: usize, y: f64) -> f64 {
        log_normal_pdf(y, self.means[state], self.std * self.std).exp()
    }
}

impl HmmModel for FixedTwoStateChain {
    fn sampled_dim(&self) -> usize {
        0
    }
    fn hidden_dim(&self) -> usize {
        2
    }
    fn obs_dim(&self) -> usize {
        1
    }
    fn sample_initial<R: Rng>(&self, _rng: &mut R, _y1: &DVector<f64>) -> DVector<f64> {
        DVector::zeros(0)
    }
    fn log_prior(&self, _x2: &DVector<f64>) -> f64 {
        0.0
    }
    fn log_initial_proposal(&self, _x2: &DVector<f64>, _y1: &DVector<f64>) -> f64 {
        0.0
    }
    fn sample_proposal<R: Rng>(
        &self,
        _rng: &mut R,
        _x2_prev: &DVector<f64>,
        _y: &DVector<f64>,
    ) -> DVector<f64> {
        DVector::zeros(0)
    }
    fn log_transition(&self, _x2: &DVector<f64>, _x2_prev: &DVector<f64>) -> f64 {
        0.0
    }
    fn log_proposal(&self, _x2: &DVector<f64>, _x2_prev: &DVector<f64>, _y: &DVector<f64>) -> f64 {
        0.0
    }
    fn initial_belief(&self, _x2_1: &DVector<f64>) -> DVector<f64> {
        dvector![self.initial[0], self.initial[1]]
    }
    fn transition_matrix(&self, _x2_1: &DVector<f64>) -> DMatrix<f64> {
        DMatrix::from_row_slice(
            2,
            2,
            &[
                self.transition[0][0],
                self.transition[0][1],
                self.transition[1][0],
                self.transition[1][1],
            ],
        )
    }
    fn observe(
        &self,
        filter: &mut HmmFilter,
        y: &DVector<f64>,
        _x2: &DVector<f64>,
    ) -> Result<(), FilterError> {
        let log_emission = dvector![
            log_normal_pdf(y[0], self.means[0], self.std * self.std),
            log_normal_pdf(y[0], self.means[1], self.std * self.std)
        ];
        filter.advance(&log_emission)
    }
}

// ============================================================================
// Models with a real sampled component
// ============================================================================

/// Scalar level model whose observation noise variance is modulated by a
/// sampled random-walk component: R_t = 1 + x2_t^2.
///
/// The noise mapping is even in x2 and the walk is symmetric around zero,
/// so the posterior mean of x2 is exactly zero by symmetry. The proposal is
/// the bootstrap (prior) one; with `trivial_densities` the transition and
/// proposal callbacks return 0 instead of the shared Gaussian density,
/// which must not change any filter output.
pub struct NoiseWalk {
    pub phi: f64,
    pub q: f64,
    pub walk_std: f64,
    pub prior_std: f64,
    pub trivial_densities: bool,
}

impl NoiseWalk {
    pub fn standard() -> Self {
        Self {
            phi: 0.95,
            q: 0.2,
            walk_std: 0.3,
            prior_std: 1.0,
            trivial_densities: false,
        }
    }

    pub fn with_trivial_densities() -> Self {
        Self {
            trivial_densities: true,
            ..Self::standard()
        }
    }

    fn obs_noise_var(x2: f64) -> f64 {
        1.0 + x2 * x2
    }
}

impl KalmanModel for NoiseWalk {
    fn sampled_dim(&self) -> usize {
        1
    }
    fn hidden_dim(&self) -> usize {
        1
    }
    fn obs_dim(&self) -> usize {
        1
    }
    fn sample_initial<R: Rng>(&self, rng: &mut R, _y1: &DVector<f64>) -> DVector<f64> {
        let noise = Normal::new(0.0, self.prior_std).unwrap();
        dvector![noise.sample(rng)]
    }
    fn log_prior(&self, x2: &DVector<f64>) -> f64 {
        if self.trivial_densities {
            0.0
        } else {
            log_normal_pdf(x2[0], 0.0, self.prior_std * self.prior_std)
        }
    }
    fn log_initial_proposal(&self, x2: &DVector<f64>, _y1: &DVector<f64>) -> f64 {
        if self.trivial_densities {
            0.0
        } else {
            log_normal_pdf(x2[0], 0.0, self.prior_std * self.prior_std)
        }
    }
    fn sample_proposal<R: Rng>(
        &self,
        rng: &mut R,
        x2_prev: &DVector<f64>,
        _y: &DVector<f64>,
    ) -> DVector<f64> {
        let noise = Normal::new(0.0, self.walk_std).unwrap();
        dvector![x2_prev[0] + noise.sample(rng)]
    }
    fn log_transition(&self, x2: &DVector<f64>, x2_prev: &DVector<f64>) -> f64 {
        if self.trivial_densities {
            0.0
        } else {
            log_normal_pdf(x2[0], x2_prev[0], self.walk_std * self.walk_std)
        }
    }
    fn log_proposal(&self, x2: &DVector<f64>, x2_prev: &DVector<f64>, _y: &DVector<f64>) -> f64 {
        if self.trivial_densities {
            0.0
        } else {
            log_normal_pdf(x2[0], x2_prev[0], self.walk_std * self.walk_std)
        }
    }
    fn initial_mean(&self, _x2_1: &DVector<f64>) -> DVector<f64> {
        dvector![0.0]
    }
    fn initial_covariance(&self, _x2_1: &DVector<f64>) -> DMatrix<f64> {
        dmatrix![1.0]
    }
    fn observe(
        &self,
        filter: &mut KalmanFilter,
        y: &DVector<f64>,
        x2: &DVector<f64>,
    ) -> Result<(), FilterError> {
        filter.advance(
            y,
            &dmatrix![self.phi],
            &dmatrix![self.q],
            &dmatrix![1.0],
            &dmatrix![Self::obs_noise_var(x2[0])],
        )
    }
}

/// Two-state chain whose emission support is a window centered on the
/// sampled component: the emission density is uniform on
/// `[x2 - half_width + mean_k, x2 + half_width + mean_k]` and zero outside.
///
/// Observations near the window edge kill only the particles whose x2
/// drifted the wrong way; observations far outside every reachable window
/// kill the whole ensemble.
pub struct WindowedHmm {
    pub means: [f64; 2],
    pub half_width: f64,
    pub walk_std: f64,
}

impl WindowedHmm {
    pub fn standard() -> Self {
        Self {
            means: [-0.5, 0.5],
            half_width: 2.0,
            walk_std: 0.5,
        }
    }
}

impl HmmModel for WindowedHmm {
    fn sampled_dim(&self) -> usize {
        1
    }
    fn hidden_dim(&self) -> usize {
        2
    }
    fn obs_dim(&self) -> usize {
        1
    }
    fn sample_initial<R: Rng>(&self, rng: &mut R, _y1: &DVector<f64>) -> DVector<f64> {
        let noise = Normal::new(0.0, 1.0).unwrap();
        dvector![noise.sample(rng)]
    }
    fn log_prior(&self, x2: &DVector<f64>) -> f64 {
        log_normal_pdf(x2[0], 0.0, 1.0)
    }
    fn log_initial_proposal(&self, x2: &DVector<f64>, _y1: &DVector<f64>) -> f64 {
        log_normal_pdf(x2[0], 0.0, 1.0)
    }
    fn sample_proposal<R: Rng>(
        &self,
        rng: &mut R,
        x2_prev: &DVector<f64>,
        _y: &DVector<f64>,
    ) -> DVector<f64> {
        let noise = Normal::new(0.0, self.walk_std).unwrap();
        dvector![x2_prev[0] + noise.sample(rng)]
    }
    fn log_transition(&self, x2: &DVector<f64>, x2_prev: &DVector<f64>) -> f64 {
        log_normal_pdf(x2[0], x2_prev[0], self.walk_std * self.walk_std)
    }
    fn log_proposal(&self, x2: &DVector<f64>, x2_prev: &DVector<f64>, _y: &DVector<f64>) -> f64 {
        log_normal_pdf(x2[0], x2_prev[0], self.walk_std * self.walk_std)
    }
    fn initial_belief(&self, _x2_1: &DVector<f64>) -> DVector<f64> {
        dvector![0.5, 0.5]
    }
    fn transition_matrix(&self, _x2_1: &DVector<f64>) -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 2, &[0.9, 0.1, 0.1, 0.9])
    }
    fn observe(
        &self,
        filter: &mut HmmFilter,
        y: &DVector<f64>,
        x2: &DVector<f64>,
    ) -> Result<(), FilterError> {
        let log_density = (2.0 * self.half_width).recip().ln();
        let log_emission = DVector::from_fn(2, |k, _| {
            if (y[0] - x2[0] - self.means[k]).abs() <= self.half_width {
                log_density
            } else {
                f64::NEG_INFINITY
            }
        });
        filter.advance(&log_emission)
    }
}
