//! Log-weight resampling strategies
//!
//! Resampling replaces the ensemble with N draws from itself, selected with
//! probability proportional to the (exponentiated) log weights, and resets
//! every log weight to `-ln N`. The inner filters and samples are permuted
//! together: position i afterwards holds a deep copy of what was at the
//! selected ancestor before the sweep.
//!
//! The engines treat the strategy as pluggable and only require the
//! equal-weight post-condition and unbiasedness of the ancestor counts,
//! E[count of index k] = N * w_k.

use nalgebra::DVector;
use rand::Rng;

use crate::common::normalize_log_weights;
use crate::errors::FilterError;

/// Resampling strategy over the three parallel ensemble arrays.
///
/// Implementations select N ancestor indices from the normalized weights
/// and then overwrite each array in place with deep copies of the selected
/// ancestors. Selection must operate in log domain (the helper
/// [`normalize_log_weights`] subtracts the running maximum before
/// exponentiating) so that extreme weights cannot overflow.
pub trait Resampler: Send + Sync {
    /// Resample the ensemble in place and reset the log weights to `-ln N`.
    ///
    /// # Arguments
    /// * `rng` - Random number generator for the ancestor draws
    /// * `inner` - Per-particle inner filter states
    /// * `samples` - Per-particle sampled state components
    /// * `log_weights` - Unnormalized log importance weights
    ///
    /// # Errors
    /// `DegenerateEnsemble` if every log weight is `-inf`.
    fn resample<T: Clone, R: Rng>(
        &self,
        rng: &mut R,
        inner: &mut [T],
        samples: &mut [DVector<f64>],
        log_weights: &mut [f64],
    ) -> Result<(), FilterError>;

    /// Strategy name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Multinomial resampling: N independent categorical draws.
///
/// Each ancestor is drawn independently by inverting the cumulative weight
/// distribution. Simple and unbiased, with the highest variance of the
/// three strategies.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultinomialResampler;

impl Resampler for MultinomialResampler {
    fn resample<T: Clone, R: Rng>(
        &self,
        rng: &mut R,
        inner: &mut [T],
        samples: &mut [DVector<f64>],
        log_weights: &mut [f64],
    ) -> Result<(), FilterError> {
        let cumulative = cumulative_weights(log_weights)?;
        let n = log_weights.len();

        let ancestors: Vec<usize> = (0..n)
            .map(|_| {
                let u: f64 = rng.gen();
                cumulative.partition_point(|&c| c < u).min(n - 1)
            })
            .collect();

        apply_ancestors(&ancestors, inner, samples, log_weights);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Multinomial"
    }
}

/// Systematic resampling: one uniform draw, deterministic spacing.
///
/// A single offset in `[0, 1/N)` positions N evenly spaced points on the
/// cumulative weight distribution. Lower variance than multinomial and the
/// most commonly used strategy in practice.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystematicResampler;

impl Resampler for SystematicResampler {
    fn resample<T: Clone, R: Rng>(
        &self,
        rng: &mut R,
        inner: &mut [T],
        samples: &mut [DVector<f64>],
        log_weights: &mut [f64],
    ) -> Result<(), FilterError> {
        let cumulative = cumulative_weights(log_weights)?;
        let n = log_weights.len();
        let step = 1.0 / n as f64;
        let start: f64 = rng.gen::<f64>() * step;

        let ancestors = ordered_ancestors(&cumulative, (0..n).map(|i| start + i as f64 * step));
        apply_ancestors(&ancestors, inner, samples, log_weights);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Systematic"
    }
}

/// Stratified resampling: one uniform draw per stratum.
///
/// Partitions `[0, 1)` into N equal strata and draws one point uniformly in
/// each, trading a little more randomness than systematic for independence
/// between strata.
#[derive(Debug, Clone, Copy, Default)]
pub struct StratifiedResampler;

impl Resampler for StratifiedResampler {
    fn resample<T: Clone, R: Rng>(
        &self,
        rng: &mut R,
        inner: &mut [T],
        samples: &mut [DVector<f64>],
        log_weights: &mut [f64],
    ) -> Result<(), FilterError> {
        let cumulative = cumulative_weights(log_weights)?;
        let n = log_weights.len();

        let points: Vec<f64> = (0..n)
            .map(|i| (i as f64 + rng.gen::<f64>()) / n as f64)
            .collect();
        let ancestors = ordered_ancestors(&cumulative, points.into_iter());
        apply_ancestors(&ancestors, inner, samples, log_weights);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Stratified"
    }
}

/// Cumulative distribution of the normalized weights.
///
/// Errors with `DegenerateEnsemble` when every log weight is `-inf`. The
/// final entry is forced to 1 so that draws at the upper boundary always
/// land on a valid index.
fn cumulative_weights(log_weights: &[f64]) -> Result<Vec<f64>, FilterError> {
    let weights = normalize_log_weights(log_weights);
    if weights.iter().all(|&w| w == 0.0) {
        return Err(FilterError::DegenerateEnsemble);
    }

    let mut cumulative = Vec::with_capacity(weights.len());
    let mut acc = 0.0;
    for w in &weights {
        acc += w;
        cumulative.push(acc);
    }
    if let Some(last) = cumulative.last_mut() {
        *last = 1.0;
    }
    Ok(cumulative)
}

/// Map monotonically increasing points on [0, 1) to ancestor indices with a
/// single pass over the cumulative distribution.
fn ordered_ancestors(
    cumulative: &[f64],
    points: impl Iterator<Item = f64>,
) -> Vec<usize> {
    let n = cumulative.len();
    let mut ancestors = Vec::with_capacity(n);
    let mut idx = 0;
    for u in points {
        while idx < n - 1 && cumulative[idx] < u {
            idx += 1;
        }
        ancestors.push(idx);
    }
    ancestors
}

/// Overwrite the parallel arrays so position i holds a deep copy of the
/// contents at `ancestors[i]`, then reset every log weight to `-ln N`.
fn apply_ancestors<T: Clone>(
    ancestors: &[usize],
    inner: &mut [T],
    samples: &mut [DVector<f64>],
    log_weights: &mut [f64],
) {
    let new_inner: Vec<T> = ancestors.iter().map(|&a| inner[a].clone()).collect();
    let new_samples: Vec<DVector<f64>> =
        ancestors.iter().map(|&a| samples[a].clone()).collect();

    for (dst, src) in inner.iter_mut().zip(new_inner) {
        *dst = src;
    }
    for (dst, src) in samples.iter_mut().zip(new_samples) {
        *dst = src;
    }

    let uniform = -(log_weights.len() as f64).ln();
    for w in log_weights.iter_mut() {
        *w = uniform;
    }
}
