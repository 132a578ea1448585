//! Linear-Gaussian filter used as the per-particle inner model
//!
//! One-step predict plus measurement update over caller-supplied system
//! matrices. The matrices are passed per call rather than stored so that a
//! particle's sampled state can reparameterize the conditional model at
//! every step.

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};

use crate::errors::FilterError;

/// Kalman filter state for one particle.
///
/// Holds the conditional mean and covariance of the marginalized state
/// component plus the log conditional likelihood of the most recent
/// observation, log p(y_t | y_{1:t-1}, conditioning).
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    /// Conditional state mean
    mean: DVector<f64>,
    /// Conditional state covariance (symmetric positive semi-definite)
    covariance: DMatrix<f64>,
    /// Log conditional likelihood of the most recent observation
    last_log_cond_like: f64,
}

impl KalmanFilter {
    /// Create a filter from an initial mean and covariance.
    ///
    /// # Errors
    /// `Configuration` if the covariance is not square with the mean's
    /// dimension, or contains non-finite entries.
    pub fn new(
        initial_mean: DVector<f64>,
        initial_covariance: DMatrix<f64>,
    ) -> Result<Self, FilterError> {
        let n = initial_mean.len();
        if n == 0 {
            return Err(FilterError::Configuration {
                description: "initial mean must be non-empty".to_string(),
            });
        }
        if initial_covariance.nrows() != n || initial_covariance.ncols() != n {
            return Err(FilterError::Configuration {
                description: format!(
                    "initial covariance is {}x{} but mean has length {}",
                    initial_covariance.nrows(),
                    initial_covariance.ncols(),
                    n
                ),
            });
        }
        if initial_mean.iter().any(|v| !v.is_finite())
            || initial_covariance.iter().any(|v| !v.is_finite())
        {
            return Err(FilterError::Configuration {
                description: "initial mean or covariance has non-finite entries".to_string(),
            });
        }

        Ok(Self {
            mean: initial_mean,
            covariance: initial_covariance,
            last_log_cond_like: 0.0,
        })
    }

    /// State dimension
    #[inline]
    pub fn state_dim(&self) -> usize {
        self.mean.len()
    }

    /// Conditional state mean
    #[inline]
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Conditional state covariance
    #[inline]
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Log conditional likelihood of the most recent observation
    #[inline]
    pub fn last_log_cond_like(&self) -> f64 {
        self.last_log_cond_like
    }

    /// Advance the filter by one predict-update cycle.
    ///
    /// Predict: `mu_pred = F mu`, `P_pred = F P F^T + Q`.
    /// Update: innovation `v = y - H mu_pred`, `S = H P_pred H^T + R`,
    /// gain `K = P_pred H^T S^{-1}`, `mu = mu_pred + K v`,
    /// `P = (I - K H) P_pred` symmetrized.
    ///
    /// The log conditional likelihood `log N(v; 0, S)` is evaluated through
    /// the Cholesky factor of `S`; neither an explicit inverse nor a
    /// determinant is formed.
    ///
    /// # Errors
    /// `DimensionMismatch` if any matrix or the observation has an
    /// inconsistent shape; `NotPositiveDefinite` if `S` has no Cholesky
    /// factorization (the engine turns this into a zero-weight particle).
    pub fn advance(
        &mut self,
        observation: &DVector<f64>,
        transition: &DMatrix<f64>,
        process_noise: &DMatrix<f64>,
        observation_matrix: &DMatrix<f64>,
        observation_noise: &DMatrix<f64>,
    ) -> Result<(), FilterError> {
        let n = self.state_dim();
        let m = observation.len();
        check_shape(transition, n, n, "state transition matrix")?;
        check_shape(process_noise, n, n, "process noise covariance")?;
        check_shape(observation_matrix, m, n, "observation matrix")?;
        check_shape(observation_noise, m, m, "observation noise covariance")?;

        // Predict
        let mean_pred = transition * &self.mean;
        let cov_pred = symmetrize(
            &(transition * &self.covariance * transition.transpose() + process_noise),
        );

        // Innovation
        let innovation = observation - observation_matrix * &mean_pred;
        let s = symmetrize(
            &(observation_matrix * &cov_pred * observation_matrix.transpose()
                + observation_noise),
        );

        let chol = s.cholesky().ok_or(FilterError::NotPositiveDefinite {
            context: "innovation covariance".to_string(),
        })?;

        // Gain: K = P_pred H^T S^{-1}, via K^T = S^{-1} H P_pred
        let gain = chol.solve(&(observation_matrix * &cov_pred)).transpose();

        // Update
        self.mean = &mean_pred + &gain * &innovation;
        let identity = DMatrix::identity(n, n);
        self.covariance = symmetrize(&((identity - &gain * observation_matrix) * cov_pred));

        // log N(v; 0, S) through the Cholesky factor
        let log_det: f64 = chol.l().diagonal().iter().map(|d| 2.0 * d.ln()).sum();
        let mahalanobis = innovation.dot(&chol.solve(&innovation));
        self.last_log_cond_like =
            -0.5 * (m as f64 * (2.0 * PI).ln() + log_det + mahalanobis);

        Ok(())
    }
}

/// Make a matrix symmetric by averaging with its transpose
fn symmetrize(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    0.5 * (matrix + matrix.transpose())
}

fn check_shape(
    matrix: &DMatrix<f64>,
    rows: usize,
    cols: usize,
    context: &str,
) -> Result<(), FilterError> {
    if matrix.nrows() != rows {
        return Err(FilterError::DimensionMismatch {
            expected: rows,
            actual: matrix.nrows(),
            context: format!("{} rows", context),
        });
    }
    if matrix.ncols() != cols {
        return Err(FilterError::DimensionMismatch {
            expected: cols,
            actual: matrix.ncols(),
            context: format!("{} columns", context),
        });
    }
    Ok(())
}
