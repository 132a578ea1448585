/*!
# rbpf - Rao-Blackwellized particle filtering

Sequential Monte Carlo inference for partially-tractable state-space
models. The state is split into a sampled component, approximated by a
weighted particle ensemble, and a marginalized component whose conditional
posterior is tracked in closed form by a per-particle inner filter, either
a discrete HMM forward filter or a linear-Gaussian Kalman filter.

## Features

- HMM-inner and Kalman-inner engine variants
- Rao-Blackwellized importance weights derived from the inner filters'
  conditional evidence, kept unnormalized in log domain
- Online marginal log-likelihood estimation and posterior expectations of
  user functionals
- Pluggable resampling strategies (multinomial, systematic, stratified) on
  a fixed schedule

## Modules

- [`engine`] - the ensemble drivers [`RbpfHmm`] and [`RbpfKalman`]
- [`filters`] - per-particle inner filters
- [`model`] - the capability traits a user model implements
- [`resample`] - resampling strategies
- [`common`] - log-domain numerical utilities

## Example

```ignore
use rbpf::{RbpfKalman, SystematicResampler};
use rand::rngs::StdRng;
use rand::SeedableRng;

let mut engine = RbpfKalman::new(my_model, SystematicResampler, 500, 5)?;
let mut rng = StdRng::seed_from_u64(42);

let mut total = 0.0;
for y in &observations {
    engine.step(&mut rng, y, &functionals)?;
    total += engine.log_cond_like();
}
println!("log likelihood: {total}, E[h]: {:?}", engine.expectations());
```
*/

// ============================================================================
// Core modules
// ============================================================================

/// Particle ensemble engines
pub mod engine;

/// Per-particle closed-form inner filters
pub mod filters;

/// User model capability traits
pub mod model;

/// Resampling strategies
pub mod resample;

/// Log-domain numerical utilities
pub mod common;

/// Error types
pub mod errors;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// Engines
pub use engine::{EnsemblePhase, Functional, RbpfHmm, RbpfKalman};

// Inner filters
pub use filters::{HmmFilter, KalmanFilter};

// Model traits
pub use model::{HmmModel, KalmanModel};

// Resamplers
pub use resample::{
    MultinomialResampler, Resampler, StratifiedResampler, SystematicResampler,
};

// Errors
pub use errors::FilterError;
