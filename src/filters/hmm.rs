//! Discrete forward filter used as the per-particle inner model
//!
//! Tracks the conditional posterior over a finite hidden state in closed
//! form. One instance belongs to exactly one particle; resampling clones it
//! by value.

use nalgebra::{DMatrix, DVector};

use crate::common::log_sum_exp;
use crate::errors::FilterError;

/// Tolerance for checking that probability vectors and transition matrix
/// rows sum to one.
const STOCHASTIC_TOLERANCE: f64 = 1e-6;

/// Forward filter for a discrete hidden Markov chain.
///
/// Holds the filtered belief vector, the (row-stochastic) transition matrix
/// and the log conditional likelihood of the most recent observation,
/// log p(y_t | y_{1:t-1}, conditioning).
///
/// The emission model is not stored here; each [`advance`](Self::advance)
/// call receives the log emission densities for the current observation,
/// which lets the caller condition them on per-particle quantities.
#[derive(Debug, Clone)]
pub struct HmmFilter {
    /// Filtered belief over the hidden states (non-negative, sums to 1)
    belief: DVector<f64>,
    /// Row-stochastic transition matrix; entry (i, j) is the probability of
    /// moving from state i to state j
    transition: DMatrix<f64>,
    /// Log conditional likelihood of the most recent observation
    last_log_cond_like: f64,
}

impl HmmFilter {
    /// Create a forward filter from an initial belief and transition matrix.
    ///
    /// # Arguments
    /// * `initial_belief` - Probability vector over the hidden states
    /// * `transition` - Row-stochastic transition matrix
    ///
    /// # Errors
    /// `Configuration` if the shapes are inconsistent, the belief does not
    /// sum to one, or a transition row does not sum to one.
    pub fn new(
        initial_belief: DVector<f64>,
        transition: DMatrix<f64>,
    ) -> Result<Self, FilterError> {
        let n = initial_belief.len();
        if n == 0 {
            return Err(FilterError::Configuration {
                description: "initial belief must be non-empty".to_string(),
            });
        }
        if transition.nrows() != n || transition.ncols() != n {
            return Err(FilterError::Configuration {
                description: format!(
                    "transition matrix is {}x{} but belief has length {}",
                    transition.nrows(),
                    transition.ncols(),
                    n
                ),
            });
        }
        if initial_belief.iter().any(|&p| p < 0.0 || !p.is_finite()) {
            return Err(FilterError::Configuration {
                description: "initial belief has negative or non-finite entries".to_string(),
            });
        }
        if (initial_belief.sum() - 1.0).abs() > STOCHASTIC_TOLERANCE {
            return Err(FilterError::Configuration {
                description: format!("initial belief sums to {}, not 1", initial_belief.sum()),
            });
        }
        for i in 0..n {
            let row_sum: f64 = transition.row(i).iter().sum();
            if (row_sum - 1.0).abs() > STOCHASTIC_TOLERANCE {
                return Err(FilterError::Configuration {
                    description: format!("transition row {} sums to {}, not 1", i, row_sum),
                });
            }
        }

        Ok(Self {
            belief: initial_belief,
            transition,
            last_log_cond_like: 0.0,
        })
    }

    /// Number of hidden states
    #[inline]
    pub fn state_dim(&self) -> usize {
        self.belief.len()
    }

    /// Filtered belief over the hidden states
    #[inline]
    pub fn belief(&self) -> &DVector<f64> {
        &self.belief
    }

    /// Log conditional likelihood of the most recent observation.
    ///
    /// `-inf` after an observation that is impossible under every hidden
    /// state.
    #[inline]
    pub fn last_log_cond_like(&self) -> f64 {
        self.last_log_cond_like
    }

    /// Advance the forward recursion by one observation.
    ///
    /// Performs the predict step `pi_bar = A^T pi`, multiplies in the
    /// emission densities in log domain, and renormalizes with a max-shifted
    /// log-sum-exp. The normalizer is recorded as the log conditional
    /// likelihood of this observation.
    ///
    /// If the observation is impossible under every state (normalizer
    /// `-inf`), the belief is left at its predicted value and the caller
    /// decides whether the particle is degenerate or the step fatal.
    ///
    /// # Arguments
    /// * `log_emission` - `log p(y_t | state = k)` for each hidden state k
    ///
    /// # Errors
    /// `DimensionMismatch` if the emission vector has the wrong length,
    /// `InvalidModelOutput` if it contains NaN.
    pub fn advance(&mut self, log_emission: &DVector<f64>) -> Result<(), FilterError> {
        let n = self.state_dim();
        if log_emission.len() != n {
            return Err(FilterError::DimensionMismatch {
                expected: n,
                actual: log_emission.len(),
                context: "emission log density vector".to_string(),
            });
        }
        if log_emission.iter().any(|v| v.is_nan()) {
            return Err(FilterError::InvalidModelOutput {
                context: "emission log density is NaN".to_string(),
            });
        }

        // Predict: pi_bar = A^T pi
        let predicted = self.transition.transpose() * &self.belief;

        // Unnormalized filtered belief in log domain
        let log_unnorm: Vec<f64> = (0..n)
            .map(|k| predicted[k].ln() + log_emission[k])
            .collect();

        let log_norm = log_sum_exp(&log_unnorm);
        self.last_log_cond_like = log_norm;

        if log_norm == f64::NEG_INFINITY {
            // Impossible observation; keep the predicted belief, which is
            // still a valid probability vector
            self.belief = predicted;
            return Ok(());
        }

        for k in 0..n {
            self.belief[k] = (log_unnorm[k] - log_norm).exp();
        }
        Ok(())
    }
}
