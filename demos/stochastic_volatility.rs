//! Stochastic volatility demo for the Kalman-inner RBPF.
//!
//! The observed series is a mean-reverting level contaminated by noise
//! whose variance follows a log-volatility random walk. Conditional on the
//! volatility path the model is linear-Gaussian, so the level is
//! marginalized by per-particle Kalman filters while only the volatility
//! is sampled.
//!
//! Run with: cargo run --example stochastic_volatility

use nalgebra::{dmatrix, dvector, DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use rbpf::{FilterError, Functional, KalmanFilter, KalmanModel, RbpfKalman, SystematicResampler};

/// Level AR(1) with volatility-modulated observation noise:
///   a_t  = phi a_{t-1} + N(0, q)
///   v_t  = v_{t-1} + N(0, tau^2)        (sampled, log volatility)
///   y_t  = a_t + N(0, exp(v_t))
struct StochasticVolatility {
    phi: f64,
    q: f64,
    tau: f64,
    prior_std: f64,
}

impl StochasticVolatility {
    fn walk_density(&self, v: f64, v_prev: f64) -> f64 {
        let diff = v - v_prev;
        -0.5 * ((2.0 * std::f64::consts::PI * self.tau * self.tau).ln()
            + diff * diff / (self.tau * self.tau))
    }
}

impl KalmanModel for StochasticVolatility {
    fn sampled_dim(&self) -> usize {
        1
    }
    fn hidden_dim(&self) -> usize {
        1
    }
    fn obs_dim(&self) -> usize {
        1
    }
    fn sample_initial<R: Rng>(&self, rng: &mut R, _y1: &DVector<f64>) -> DVector<f64> {
        let prior = Normal::new(0.0, self.prior_std).unwrap();
        dvector![prior.sample(rng)]
    }
    fn log_prior(&self, v: &DVector<f64>) -> f64 {
        let var = self.prior_std * self.prior_std;
        -0.5 * ((2.0 * std::f64::consts::PI * var).ln() + v[0] * v[0] / var)
    }
    fn log_initial_proposal(&self, v: &DVector<f64>, _y1: &DVector<f64>) -> f64 {
        self.log_prior(v)
    }
    fn sample_proposal<R: Rng>(
        &self,
        rng: &mut R,
        v_prev: &DVector<f64>,
        _y: &DVector<f64>,
    ) -> DVector<f64> {
        let walk = Normal::new(0.0, self.tau).unwrap();
        dvector![v_prev[0] + walk.sample(rng)]
    }
    fn log_transition(&self, v: &DVector<f64>, v_prev: &DVector<f64>) -> f64 {
        self.walk_density(v[0], v_prev[0])
    }
    fn log_proposal(&self, v: &DVector<f64>, v_prev: &DVector<f64>, _y: &DVector<f64>) -> f64 {
        self.walk_density(v[0], v_prev[0])
    }
    fn initial_mean(&self, _v1: &DVector<f64>) -> DVector<f64> {
        dvector![0.0]
    }
    fn initial_covariance(&self, _v1: &DVector<f64>) -> DMatrix<f64> {
        dmatrix![2.0]
    }
    fn observe(
        &self,
        filter: &mut KalmanFilter,
        y: &DVector<f64>,
        v: &DVector<f64>,
    ) -> Result<(), FilterError> {
        filter.advance(
            y,
            &dmatrix![self.phi],
            &dmatrix![self.q],
            &dmatrix![1.0],
            &dmatrix![v[0].exp()],
        )
    }
}

fn main() -> Result<(), FilterError> {
    let model = StochasticVolatility {
        phi: 0.97,
        q: 0.05,
        tau: 0.15,
        prior_std: 0.5,
    };

    // Simulate a trajectory from the model
    let steps = 200;
    let mut sim_rng = StdRng::seed_from_u64(7);
    let level_noise = Normal::new(0.0, model.q.sqrt()).unwrap();
    let walk_noise = Normal::new(0.0, model.tau).unwrap();
    let standard = Normal::new(0.0, 1.0).unwrap();

    let mut level = 0.0;
    let mut log_vol: f64 = 0.0;
    let mut observations = Vec::with_capacity(steps);
    let mut true_vols = Vec::with_capacity(steps);
    for _ in 0..steps {
        level = model.phi * level + level_noise.sample(&mut sim_rng);
        log_vol += walk_noise.sample(&mut sim_rng);
        observations.push(level + (log_vol / 2.0).exp() * standard.sample(&mut sim_rng));
        true_vols.push(log_vol);
    }

    // Track the posterior means of the log volatility and the level
    let functionals: Vec<Functional> = vec![
        Box::new(|_mean, v| DMatrix::from_element(1, 1, v[0])),
        Box::new(|mean, _v| DMatrix::from_element(1, 1, mean[0])),
    ];

    let mut engine = RbpfKalman::new(model, SystematicResampler, 500, 5)?;
    let mut rng = StdRng::seed_from_u64(42);

    let mut total_log_like = 0.0;
    let mut vol_sq_err = 0.0;
    for (t, &y) in observations.iter().enumerate() {
        engine.step(&mut rng, &dvector![y], &functionals)?;
        total_log_like += engine.log_cond_like();

        let vol_estimate = engine.expectations()[0][(0, 0)];
        vol_sq_err += (vol_estimate - true_vols[t]).powi(2);

        if (t + 1) % 50 == 0 {
            println!(
                "t = {:3}  log p(y_t | y_1:t-1) = {:8.4}  E[v_t] = {:7.3}  E[a_t] = {:7.3}  ESS = {:6.1}",
                t + 1,
                engine.log_cond_like(),
                vol_estimate,
                engine.expectations()[1][(0, 0)],
                engine.effective_sample_size(),
            );
        }
    }

    println!();
    println!("total log likelihood: {:.4}", total_log_like);
    println!(
        "volatility tracking RMSE: {:.4}",
        (vol_sq_err / steps as f64).sqrt()
    );
    Ok(())
}
