//! Common utilities shared by the filter implementations.
//!
//! This module contains the log-domain numerical helpers that the engines
//! and resamplers rely on.

pub mod numerics;

pub use numerics::{effective_sample_size, log_sum_exp, normalize_log_weights};
