//! Rao-Blackwellized particle filter engines
//!
//! The engines drive an ensemble of N particles, each owning a sampled
//! state component and a closed-form inner filter for the marginalized
//! component:
//!
//! - [`RbpfHmm`] - inner discrete forward filters
//! - [`RbpfKalman`] - inner linear-Gaussian filters
//!
//! Per observation, an engine proposes each particle's sampled component,
//! advances that particle's inner filter, folds the inner filter's log
//! conditional evidence into the importance weight, emits the marginal
//! log-likelihood increment, averages user functionals against the joint
//! posterior, and periodically resamples. All weight arithmetic stays in
//! log domain; weights are never silently renormalized or clamped.

pub mod hmm;
pub mod kalman;

pub use hmm::RbpfHmm;
pub use kalman::RbpfKalman;

use nalgebra::{DMatrix, DVector};
use smallvec::SmallVec;

use crate::errors::FilterError;

/// A functional h(x1 belief, x2) averaged against the Rao-Blackwellized
/// posterior by [`RbpfHmm::step`] and [`RbpfKalman::step`].
///
/// The first argument is the particle's inner filter summary (the HMM
/// belief vector or the Kalman mean); the second is the particle's sampled
/// component. The output shape must be the same for every particle and
/// every call.
pub type Functional = Box<dyn Fn(&DVector<f64>, &DVector<f64>) -> DMatrix<f64> + Send + Sync>;

/// Scratch vector of expectation matrices, one per functional
pub(crate) type Expectations = SmallVec<[DMatrix<f64>; 4]>;

/// Lifecycle of the particle ensemble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsemblePhase {
    /// No observation processed yet; the ensemble is uninitialized
    Fresh,
    /// At least one observation processed and some particle carries weight
    Active,
    /// Every particle's log weight is `-inf`; terminal until a reset
    Degenerate,
}

/// Rao-Blackwellized posterior expectations of the given functionals.
///
/// For each functional h computes
/// `sum_i h(belief_i, x2_i) exp(logw_i - m) / sum_i exp(logw_i - m)`
/// with m the running maximum log weight. Particles at `-inf` contribute
/// nothing and their functionals are not evaluated.
///
/// Must be called before resampling, while the weights are still
/// informative.
pub(crate) fn rao_blackwell_expectations(
    functionals: &[Functional],
    log_weights: &[f64],
    beliefs: &[&DVector<f64>],
    samples: &[DVector<f64>],
) -> Result<Expectations, FilterError> {
    let mut expectations = Expectations::new();
    if functionals.is_empty() {
        return Ok(expectations);
    }

    let max_log_weight = log_weights
        .iter()
        .cloned()
        .fold(f64::NEG_INFINITY, f64::max);
    if max_log_weight == f64::NEG_INFINITY {
        return Err(FilterError::DegenerateEnsemble);
    }

    for (f_idx, h) in functionals.iter().enumerate() {
        let mut numerator: Option<DMatrix<f64>> = None;
        let mut denominator = 0.0;

        for i in 0..log_weights.len() {
            if log_weights[i] == f64::NEG_INFINITY {
                continue;
            }
            let weight = (log_weights[i] - max_log_weight).exp();
            let value = h(beliefs[i], &samples[i]);
            if value.iter().any(|v| v.is_nan()) {
                return Err(FilterError::InvalidModelOutput {
                    context: format!("functional {} returned NaN", f_idx),
                });
            }

            match numerator.as_mut() {
                None => numerator = Some(value * weight),
                Some(acc) => {
                    if value.nrows() != acc.nrows() || value.ncols() != acc.ncols() {
                        return Err(FilterError::DimensionMismatch {
                            expected: acc.nrows(),
                            actual: value.nrows(),
                            context: format!("output of functional {}", f_idx),
                        });
                    }
                    *acc += value * weight;
                }
            }
            denominator += weight;
        }

        // max_log_weight is finite, so at least one particle contributed
        match numerator {
            Some(numerator) => expectations.push(numerator / denominator),
            None => return Err(FilterError::DegenerateEnsemble),
        }
    }

    Ok(expectations)
}

/// Reject NaN coming out of a user density callback
pub(crate) fn check_log_density(value: f64, context: &str) -> Result<f64, FilterError> {
    if value.is_nan() {
        return Err(FilterError::InvalidModelOutput {
            context: format!("{} is NaN", context),
        });
    }
    Ok(value)
}

/// Reject samples of the wrong dimension or containing non-finite entries
pub(crate) fn check_sample(
    sample: &DVector<f64>,
    expected_dim: usize,
    context: &str,
) -> Result<(), FilterError> {
    if sample.len() != expected_dim {
        return Err(FilterError::DimensionMismatch {
            expected: expected_dim,
            actual: sample.len(),
            context: context.to_string(),
        });
    }
    if sample.iter().any(|v| !v.is_finite()) {
        return Err(FilterError::InvalidModelOutput {
            context: format!("{} has non-finite entries", context),
        });
    }
    Ok(())
}

/// Reject observations containing NaN
pub(crate) fn check_observation(
    observation: &DVector<f64>,
    expected_dim: usize,
) -> Result<(), FilterError> {
    if observation.len() != expected_dim {
        return Err(FilterError::DimensionMismatch {
            expected: expected_dim,
            actual: observation.len(),
            context: "observation dimension".to_string(),
        });
    }
    if observation.iter().any(|v| v.is_nan()) {
        return Err(FilterError::InvalidModelOutput {
            context: "observation contains NaN".to_string(),
        });
    }
    Ok(())
}
