//! RBPF engine with inner linear-Gaussian filters

use nalgebra::DVector;
use rand::Rng;
use tracing::{debug, warn};

use crate::common::{effective_sample_size, log_sum_exp};
use crate::errors::FilterError;
use crate::filters::KalmanFilter;
use crate::model::KalmanModel;
use crate::resample::Resampler;

use super::{
    check_log_density, check_observation, check_sample, rao_blackwell_expectations,
    EnsemblePhase, Expectations, Functional,
};

/// Rao-Blackwellized particle filter whose marginalized state component is
/// linear-Gaussian conditional on the sampled component.
///
/// Identical ensemble bookkeeping to [`RbpfHmm`](super::RbpfHmm), with one
/// extra numerical policy: a `NotPositiveDefinite` innovation covariance in
/// a particle's inner filter is not fatal to the step; the particle's log
/// weight is set to `-inf` and the sweep continues. Only when every
/// particle is lost does the engine degenerate.
pub struct RbpfKalman<M: KalmanModel, S: Resampler> {
    model: M,
    resampler: S,
    n_particles: usize,
    resample_every: usize,
    phase: EnsemblePhase,
    /// Number of completed steps
    t: usize,
    inner: Vec<KalmanFilter>,
    samples: Vec<DVector<f64>>,
    log_weights: Vec<f64>,
    last_log_cond_like: f64,
    expectations: Expectations,
    /// Functional count fixed by the first step call
    n_functionals: Option<usize>,
}

impl<M: KalmanModel, S: Resampler> RbpfKalman<M, S> {
    /// Create an engine with an uninitialized ensemble.
    ///
    /// # Arguments
    /// * `model` - User model supplying proposals, densities and the inner
    ///   filter parameterization
    /// * `resampler` - Resampling strategy
    /// * `n_particles` - Ensemble size N
    /// * `resample_every` - Resample once every `resample_every` steps;
    ///   pass `usize::MAX` to disable resampling
    ///
    /// # Errors
    /// `Configuration` if N or the resampling period is zero, or the model
    /// reports a zero hidden or observation dimension.
    pub fn new(
        model: M,
        resampler: S,
        n_particles: usize,
        resample_every: usize,
    ) -> Result<Self, FilterError> {
        if n_particles == 0 {
            return Err(FilterError::Configuration {
                description: "particle count must be at least 1".to_string(),
            });
        }
        if resample_every == 0 {
            return Err(FilterError::Configuration {
                description: "resampling period must be at least 1".to_string(),
            });
        }
        if model.hidden_dim() == 0 {
            return Err(FilterError::Configuration {
                description: "hidden state dimension must be at least 1".to_string(),
            });
        }
        if model.obs_dim() == 0 {
            return Err(FilterError::Configuration {
                description: "observation dimension must be at least 1".to_string(),
            });
        }

        Ok(Self {
            model,
            resampler,
            n_particles,
            resample_every,
            phase: EnsemblePhase::Fresh,
            t: 0,
            inner: Vec::new(),
            samples: Vec::new(),
            log_weights: vec![0.0; n_particles],
            last_log_cond_like: 0.0,
            expectations: Expectations::new(),
            n_functionals: None,
        })
    }

    /// Advance the ensemble by one observation.
    ///
    /// See [`RbpfHmm::step`](super::RbpfHmm::step); the flow is the same.
    /// Expectations average the functionals over the inner filters'
    /// conditional means and the sampled components.
    pub fn step<R: Rng>(
        &mut self,
        rng: &mut R,
        observation: &DVector<f64>,
        functionals: &[Functional],
    ) -> Result<(), FilterError> {
        if self.phase == EnsemblePhase::Degenerate {
            return Err(FilterError::DegenerateEnsemble);
        }
        check_observation(observation, self.model.obs_dim())?;
        match self.n_functionals {
            None => self.n_functionals = Some(functionals.len()),
            Some(expected) if expected != functionals.len() => {
                return Err(FilterError::Configuration {
                    description: format!(
                        "functional count changed from {} to {}",
                        expected,
                        functionals.len()
                    ),
                });
            }
            Some(_) => {}
        }

        let total = if self.phase == EnsemblePhase::Fresh {
            self.first_step(rng, observation)?
        } else {
            self.later_step(rng, observation)?
        };

        let t_next = self.t + 1;

        if total == f64::NEG_INFINITY {
            warn!(t = t_next, "ensemble degenerate: every particle weight is zero");
            self.phase = EnsemblePhase::Degenerate;
            self.expectations.clear();
            self.t = t_next;
            return Ok(());
        }

        // Expectations use the pre-resampling weights
        let means: Vec<&DVector<f64>> = self.inner.iter().map(|f| f.mean()).collect();
        self.expectations =
            rao_blackwell_expectations(functionals, &self.log_weights, &means, &self.samples)?;

        if t_next % self.resample_every == 0 {
            self.resampler.resample(
                rng,
                &mut self.inner,
                &mut self.samples,
                &mut self.log_weights,
            )?;
            debug!(t = t_next, strategy = self.resampler.name(), "resampled ensemble");
        }

        self.t = t_next;
        self.phase = EnsemblePhase::Active;
        Ok(())
    }

    /// Initialize the ensemble from the first observation and return the
    /// log-sum-exp of the new weights.
    fn first_step<R: Rng>(
        &mut self,
        rng: &mut R,
        y1: &DVector<f64>,
    ) -> Result<f64, FilterError> {
        let n = self.n_particles;
        let mut inner = Vec::with_capacity(n);
        let mut samples = Vec::with_capacity(n);
        let mut log_weights = Vec::with_capacity(n);

        for _ in 0..n {
            let x2 = self.model.sample_initial(rng, y1);
            check_sample(&x2, self.model.sampled_dim(), "initial proposal sample")?;

            let mut filter = KalmanFilter::new(
                self.model.initial_mean(&x2),
                self.model.initial_covariance(&x2),
            )?;
            if filter.state_dim() != self.model.hidden_dim() {
                return Err(FilterError::DimensionMismatch {
                    expected: self.model.hidden_dim(),
                    actual: filter.state_dim(),
                    context: "inner filter hidden dimension".to_string(),
                });
            }

            let log_weight = match self.model.observe(&mut filter, y1, &x2) {
                Ok(()) => {
                    let log_q1 = check_log_density(
                        self.model.log_initial_proposal(&x2, y1),
                        "log_initial_proposal",
                    )?;
                    if log_q1 == f64::NEG_INFINITY {
                        return Err(FilterError::InvalidModelOutput {
                            context: "initial proposal density is zero at its own sample"
                                .to_string(),
                        });
                    }
                    let log_mu = check_log_density(self.model.log_prior(&x2), "log_prior")?;
                    filter.last_log_cond_like() + log_mu - log_q1
                }
                Err(FilterError::NotPositiveDefinite { .. }) => f64::NEG_INFINITY,
                Err(e) => return Err(e),
            };

            log_weights.push(log_weight);
            inner.push(filter);
            samples.push(x2);
        }

        self.inner = inner;
        self.samples = samples;
        self.log_weights = log_weights;

        let total = log_sum_exp(&self.log_weights);
        self.last_log_cond_like = total - (n as f64).ln();
        Ok(total)
    }

    /// Propagate an initialized ensemble and return the log-sum-exp of the
    /// updated weights.
    fn later_step<R: Rng>(
        &mut self,
        rng: &mut R,
        y: &DVector<f64>,
    ) -> Result<f64, FilterError> {
        // Denominator of the likelihood increment, captured before the
        // weights change
        let denom = log_sum_exp(&self.log_weights);

        for i in 0..self.n_particles {
            let x2_new = self.model.sample_proposal(rng, &self.samples[i], y);
            check_sample(&x2_new, self.model.sampled_dim(), "proposal sample")?;

            match self.model.observe(&mut self.inner[i], y, &x2_new) {
                Ok(()) => {
                    let log_q = check_log_density(
                        self.model.log_proposal(&x2_new, &self.samples[i], y),
                        "log_proposal",
                    )?;
                    if log_q == f64::NEG_INFINITY {
                        return Err(FilterError::InvalidModelOutput {
                            context: "proposal density is zero at its own sample".to_string(),
                        });
                    }
                    let log_f = check_log_density(
                        self.model.log_transition(&x2_new, &self.samples[i]),
                        "log_transition",
                    )?;
                    self.log_weights[i] +=
                        self.inner[i].last_log_cond_like() + log_f - log_q;
                }
                Err(FilterError::NotPositiveDefinite { .. }) => {
                    self.log_weights[i] = f64::NEG_INFINITY;
                }
                Err(e) => return Err(e),
            }
            self.samples[i] = x2_new;
        }

        let total = log_sum_exp(&self.log_weights);
        self.last_log_cond_like = total - denom;
        Ok(total)
    }

    /// Most recent marginal log-likelihood increment
    /// `log p(y_t | y_{1:t-1})`; at t = 1 this is `log p(y_1)`, and `-inf`
    /// once the ensemble is degenerate.
    #[inline]
    pub fn log_cond_like(&self) -> f64 {
        self.last_log_cond_like
    }

    /// Expectations cached by the last `step`, indexed like the functional
    /// list. Empty if no functionals were supplied or the ensemble
    /// degenerated.
    #[inline]
    pub fn expectations(&self) -> &[nalgebra::DMatrix<f64>] {
        &self.expectations
    }

    /// Current lifecycle phase of the ensemble
    #[inline]
    pub fn phase(&self) -> EnsemblePhase {
        self.phase
    }

    /// Number of completed steps
    #[inline]
    pub fn time_step(&self) -> usize {
        self.t
    }

    /// Ensemble size N
    #[inline]
    pub fn n_particles(&self) -> usize {
        self.n_particles
    }

    /// Effective sample size of the current weights (between 1 and N)
    pub fn effective_sample_size(&self) -> f64 {
        effective_sample_size(&self.log_weights)
    }

    /// The user model
    #[inline]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Return the engine to the Fresh phase with an uninitialized ensemble.
    ///
    /// The next `step` re-runs the first-step initialization. This is the
    /// only way out of the Degenerate phase.
    pub fn reset(&mut self) {
        self.phase = EnsemblePhase::Fresh;
        self.t = 0;
        self.inner.clear();
        self.samples.clear();
        self.log_weights = vec![0.0; self.n_particles];
        self.last_log_cond_like = 0.0;
        self.expectations.clear();
        self.n_functionals = None;
    }
}
