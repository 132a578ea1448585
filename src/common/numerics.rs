//! Log-domain numerical utilities
//!
//! Helper functions for working with unnormalized log weights. All weight
//! arithmetic in the engines goes through these so that the running maximum
//! is always subtracted before exponentiating.

/// Compute log-sum-exp for numerical stability
///
/// Computes log(sum(exp(x))) in a numerically stable way.
///
/// # Arguments
/// * `values` - Slice of log values; `-inf` entries contribute nothing
///
/// # Returns
/// Log of sum of exponentials, or `-inf` for an empty slice or a slice of
/// `-inf` values
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }

    let max_val = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }

    let sum: f64 = values.iter().map(|v| (v - max_val).exp()).sum();
    max_val + sum.ln()
}

/// Normalize log weights
///
/// Convert log weights to normalized linear weights. `-inf` entries map to
/// zero weight.
///
/// # Arguments
/// * `log_weights` - Slice of unnormalized log weights
///
/// # Returns
/// Normalized weights summing to 1, or all zeros if every input is `-inf`
pub fn normalize_log_weights(log_weights: &[f64]) -> Vec<f64> {
    let log_sum = log_sum_exp(log_weights);
    if log_sum == f64::NEG_INFINITY {
        return vec![0.0; log_weights.len()];
    }
    log_weights.iter().map(|w| (w - log_sum).exp()).collect()
}

/// Effective sample size of a log-weighted ensemble
///
/// Computed as 1 / sum(w_i^2) over the normalized weights. Ranges from 1
/// (a single particle carries all the mass) to N (uniform weights). Returns
/// 0 when every weight is `-inf`.
pub fn effective_sample_size(log_weights: &[f64]) -> f64 {
    let weights = normalize_log_weights(log_weights);
    let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
    if sum_sq == 0.0 {
        0.0
    } else {
        1.0 / sum_sq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_sum_exp_matches_direct() {
        let vals: [f64; 3] = [0.1, -0.4, 1.2];
        let direct: f64 = vals.iter().map(|v| v.exp()).sum::<f64>().ln();
        assert!((log_sum_exp(&vals) - direct).abs() < 1e-12);
    }

    #[test]
    fn test_log_sum_exp_large_values() {
        // Direct exponentiation would overflow here
        let vals = [1000.0, 1000.0];
        let expected = 1000.0 + 2.0_f64.ln();
        assert!((log_sum_exp(&vals) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_log_sum_exp_shift_invariance() {
        let vals = [0.3, -1.7, 2.2, 0.0];
        let base = log_sum_exp(&vals);
        for shift in [-500.0, -3.0, 7.5, 300.0] {
            let shifted: Vec<f64> = vals.iter().map(|v| v + shift).collect();
            assert!((log_sum_exp(&shifted) - (base + shift)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_log_sum_exp_degenerate() {
        assert_eq!(log_sum_exp(&[]), f64::NEG_INFINITY);
        assert_eq!(
            log_sum_exp(&[f64::NEG_INFINITY, f64::NEG_INFINITY]),
            f64::NEG_INFINITY
        );
        // A single -inf entry must not poison the rest
        let vals = [0.0, f64::NEG_INFINITY];
        assert!((log_sum_exp(&vals) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_log_weights() {
        let weights = normalize_log_weights(&[0.0, 0.0, f64::NEG_INFINITY]);
        assert!((weights[0] - 0.5).abs() < 1e-12);
        assert!((weights[1] - 0.5).abs() < 1e-12);
        assert_eq!(weights[2], 0.0);

        let all_zero = normalize_log_weights(&[f64::NEG_INFINITY; 3]);
        assert!(all_zero.iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_effective_sample_size() {
        // Uniform weights give ESS = N
        assert!((effective_sample_size(&[1.5; 8]) - 8.0).abs() < 1e-9);
        // One dominant particle gives ESS near 1
        let ess = effective_sample_size(&[0.0, -50.0, -50.0]);
        assert!((ess - 1.0).abs() < 1e-9);
        // Fully degenerate ensemble
        assert_eq!(effective_sample_size(&[f64::NEG_INFINITY; 4]), 0.0);
    }
}
