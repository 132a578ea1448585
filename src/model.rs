//! User model capability traits
//!
//! A Rao-Blackwellized particle filter splits the state into a sampled
//! component `x2` and a marginalized component `x1`. The user supplies the
//! parts the engine cannot know: how to propose and evaluate `x2`, and how
//! a particle's inner filter is parameterized and advanced given `x2`.
//!
//! The callbacks are grouped into one trait per engine variant rather than
//! an inheritance hierarchy; any type that satisfies the capability can
//! drive the engine. All densities are supplied and returned in natural-log
//! domain, `-inf` denotes impossibility, and NaN is treated by the engines
//! as a fatal model error.

use nalgebra::{DMatrix, DVector};
use rand::Rng;

use crate::errors::FilterError;
use crate::filters::{HmmFilter, KalmanFilter};

/// User model for an RBPF whose marginalized component is a discrete hidden
/// Markov chain.
///
/// The proposal/transition/prior callbacks describe the sampled component
/// `x2`; [`initial_belief`](Self::initial_belief) and
/// [`transition_matrix`](Self::transition_matrix) parameterize each
/// particle's inner forward filter at time 1; [`observe`](Self::observe)
/// advances an inner filter one step given the current observation and the
/// particle's freshly sampled `x2`.
pub trait HmmModel {
    /// Dimension of the sampled state component `x2` (may be zero)
    fn sampled_dim(&self) -> usize;

    /// Number of hidden states tracked by the inner filter
    fn hidden_dim(&self) -> usize;

    /// Dimension of an observation vector
    fn obs_dim(&self) -> usize;

    /// Sample `x2_1` from the initial proposal given the first observation
    fn sample_initial<R: Rng>(&self, rng: &mut R, y1: &DVector<f64>) -> DVector<f64>;

    /// Log prior density `log mu(x2_1)`
    fn log_prior(&self, x2: &DVector<f64>) -> f64;

    /// Log initial proposal density `log q1(x2_1 | y1)`
    fn log_initial_proposal(&self, x2: &DVector<f64>, y1: &DVector<f64>) -> f64;

    /// Propose `x2_t` given the previous sampled state and the current
    /// observation
    fn sample_proposal<R: Rng>(
        &self,
        rng: &mut R,
        x2_prev: &DVector<f64>,
        y: &DVector<f64>,
    ) -> DVector<f64>;

    /// Log transition density `log f(x2_t | x2_{t-1})`
    fn log_transition(&self, x2: &DVector<f64>, x2_prev: &DVector<f64>) -> f64;

    /// Log proposal density `log q(x2_t | x2_{t-1}, y_t)`
    fn log_proposal(&self, x2: &DVector<f64>, x2_prev: &DVector<f64>, y: &DVector<f64>)
        -> f64;

    /// Initial belief vector for a particle's inner filter
    fn initial_belief(&self, x2_1: &DVector<f64>) -> DVector<f64>;

    /// Row-stochastic transition matrix for a particle's inner filter
    fn transition_matrix(&self, x2_1: &DVector<f64>) -> DMatrix<f64>;

    /// Advance a particle's inner filter one step.
    ///
    /// Typically computes the emission log densities
    /// `log p(y_t | state = k, x2_t)` and calls
    /// [`HmmFilter::advance`].
    fn observe(
        &self,
        filter: &mut HmmFilter,
        y: &DVector<f64>,
        x2: &DVector<f64>,
    ) -> Result<(), FilterError>;
}

/// User model for an RBPF whose marginalized component is linear-Gaussian.
///
/// Mirrors [`HmmModel`] with the inner filter parameterized by an initial
/// mean and covariance. [`observe`](Self::observe) assembles the
/// conditional system matrices `(F, Q, H, R)`, which may depend on the
/// particle's sampled state, and calls [`KalmanFilter::advance`].
pub trait KalmanModel {
    /// Dimension of the sampled state component `x2` (may be zero)
    fn sampled_dim(&self) -> usize;

    /// Dimension of the marginalized state tracked by the inner filter
    fn hidden_dim(&self) -> usize;

    /// Dimension of an observation vector
    fn obs_dim(&self) -> usize;

    /// Sample `x2_1` from the initial proposal given the first observation
    fn sample_initial<R: Rng>(&self, rng: &mut R, y1: &DVector<f64>) -> DVector<f64>;

    /// Log prior density `log mu(x2_1)`
    fn log_prior(&self, x2: &DVector<f64>) -> f64;

    /// Log initial proposal density `log q1(x2_1 | y1)`
    fn log_initial_proposal(&self, x2: &DVector<f64>, y1: &DVector<f64>) -> f64;

    /// Propose `x2_t` given the previous sampled state and the current
    /// observation
    fn sample_proposal<R: Rng>(
        &self,
        rng: &mut R,
        x2_prev: &DVector<f64>,
        y: &DVector<f64>,
    ) -> DVector<f64>;

    /// Log transition density `log f(x2_t | x2_{t-1})`
    fn log_transition(&self, x2: &DVector<f64>, x2_prev: &DVector<f64>) -> f64;

    /// Log proposal density `log q(x2_t | x2_{t-1}, y_t)`
    fn log_proposal(&self, x2: &DVector<f64>, x2_prev: &DVector<f64>, y: &DVector<f64>)
        -> f64;

    /// Initial conditional mean for a particle's inner filter
    fn initial_mean(&self, x2_1: &DVector<f64>) -> DVector<f64>;

    /// Initial conditional covariance for a particle's inner filter
    fn initial_covariance(&self, x2_1: &DVector<f64>) -> DMatrix<f64>;

    /// Advance a particle's inner filter one step.
    ///
    /// A `NotPositiveDefinite` error from [`KalmanFilter::advance`] is
    /// converted by the engine into a zero-weight particle; any other error
    /// aborts the step.
    fn observe(
        &self,
        filter: &mut KalmanFilter,
        y: &DVector<f64>,
        x2: &DVector<f64>,
    ) -> Result<(), FilterError>;
}
