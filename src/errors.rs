//! Error types for the filter engines and their components
//!
//! This module provides proper error handling instead of panics.

use std::fmt;

/// Errors that can occur during filtering
#[derive(Debug, Clone)]
pub enum FilterError {
    /// Invalid construction parameters (zero particles, zero resampling
    /// period, malformed model matrices)
    Configuration {
        /// Description of the configuration issue
        description: String,
    },

    /// Dimension mismatch between expected and actual
    DimensionMismatch {
        /// What was expected
        expected: usize,
        /// What was received
        actual: usize,
        /// Context (e.g., "observation dimension", "sampled state dimension")
        context: String,
    },

    /// Innovation covariance (or another matrix that must admit a Cholesky
    /// factorization) is not positive definite
    NotPositiveDefinite {
        /// Description of which matrix failed
        context: String,
    },

    /// A user model callback produced NaN or an otherwise invalid value
    InvalidModelOutput {
        /// Description of the offending callback output
        context: String,
    },

    /// Every particle carries zero weight; the ensemble can no longer be
    /// advanced without a reset
    DegenerateEnsemble,
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::Configuration { description } => {
                write!(f, "Configuration error: {}", description)
            }
            FilterError::DimensionMismatch {
                expected,
                actual,
                context,
            } => {
                write!(
                    f,
                    "Dimension mismatch for {}: expected {}, got {}",
                    context, expected, actual
                )
            }
            FilterError::NotPositiveDefinite { context } => {
                write!(f, "Matrix not positive definite: {}", context)
            }
            FilterError::InvalidModelOutput { context } => {
                write!(f, "Invalid model output: {}", context)
            }
            FilterError::DegenerateEnsemble => {
                write!(f, "Ensemble is degenerate (all particle weights are zero)")
            }
        }
    }
}

impl std::error::Error for FilterError {}
