//! Per-particle closed-form inner filters.
//!
//! Each particle in a Rao-Blackwellized ensemble owns one of these exact
//! filters for the marginalized state component:
//!
//! - [`HmmFilter`] - discrete forward recursion over a finite hidden state
//! - [`KalmanFilter`] - linear-Gaussian predict plus update
//!
//! Both expose the log conditional likelihood of the most recent
//! observation, which is the quantity the engines fold into the importance
//! weights.

pub mod hmm;
pub mod kalman;

pub use hmm::HmmFilter;
pub use kalman::KalmanFilter;
