//! Regime-switching demo for the HMM-inner RBPF.
//!
//! Observations follow one of two volatility regimes selected by a hidden
//! Markov chain, offset by a slowly drifting baseline. The regime is
//! marginalized by per-particle forward filters while the baseline drift
//! is sampled.
//!
//! Run with: cargo run --example regime_switching

use nalgebra::{dvector, DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use rbpf::{FilterError, Functional, HmmFilter, HmmModel, RbpfHmm, StratifiedResampler};

const CALM: usize = 0;
const TURBULENT: usize = 1;

/// Two-regime observation model over a drifting baseline:
///   m_t     = m_{t-1} + N(0, tau^2)        (sampled baseline)
///   s_t     ~ Markov chain on {calm, turbulent}
///   y_t     = m_t + N(0, sigma_{s_t}^2)
struct RegimeSwitching {
    transition: [[f64; 2]; 2],
    sigmas: [f64; 2],
    tau: f64,
    prior_std: f64,
}

impl RegimeSwitching {
    fn walk_density(&self, m: f64, m_prev: f64) -> f64 {
        let diff = m - m_prev;
        -0.5 * ((2.0 * std::f64::consts::PI * self.tau * self.tau).ln()
            + diff * diff / (self.tau * self.tau))
    }

    fn log_emission(&self, regime: usize, y: f64, baseline: f64) -> f64 {
        let var = self.sigmas[regime] * self.sigmas[regime];
        let diff = y - baseline;
        -0.5 * ((2.0 * std::f64::consts::PI * var).ln() + diff * diff / var)
    }
}

impl HmmModel for RegimeSwitching {
    fn sampled_dim(&self) -> usize {
        1
    }
    fn hidden_dim(&self) -> usize {
        2
    }
    fn obs_dim(&self) -> usize {
        1
    }
    fn sample_initial<R: Rng>(&self, rng: &mut R, _y1: &DVector<f64>) -> DVector<f64> {
        let prior = Normal::new(0.0, self.prior_std).unwrap();
        dvector![prior.sample(rng)]
    }
    fn log_prior(&self, m: &DVector<f64>) -> f64 {
        let var = self.prior_std * self.prior_std;
        -0.5 * ((2.0 * std::f64::consts::PI * var).ln() + m[0] * m[0] / var)
    }
    fn log_initial_proposal(&self, m: &DVector<f64>, _y1: &DVector<f64>) -> f64 {
        self.log_prior(m)
    }
    fn sample_proposal<R: Rng>(
        &self,
        rng: &mut R,
        m_prev: &DVector<f64>,
        _y: &DVector<f64>,
    ) -> DVector<f64> {
        let walk = Normal::new(0.0, self.tau).unwrap();
        dvector![m_prev[0] + walk.sample(rng)]
    }
    fn log_transition(&self, m: &DVector<f64>, m_prev: &DVector<f64>) -> f64 {
        self.walk_density(m[0], m_prev[0])
    }
    fn log_proposal(&self, m: &DVector<f64>, m_prev: &DVector<f64>, _y: &DVector<f64>) -> f64 {
        self.walk_density(m[0], m_prev[0])
    }
    fn initial_belief(&self, _m1: &DVector<f64>) -> DVector<f64> {
        dvector![0.5, 0.5]
    }
    fn transition_matrix(&self, _m1: &DVector<f64>) -> DMatrix<f64> {
        DMatrix::from_row_slice(
            2,
            2,
            &[
                self.transition[0][0],
                self.transition[0][1],
                self.transition[1][0],
                self.transition[1][1],
            ],
        )
    }
    fn observe(
        &self,
        filter: &mut HmmFilter,
        y: &DVector<f64>,
        m: &DVector<f64>,
    ) -> Result<(), FilterError> {
        let log_emission = dvector![
            self.log_emission(CALM, y[0], m[0]),
            self.log_emission(TURBULENT, y[0], m[0])
        ];
        filter.advance(&log_emission)
    }
}

fn main() -> Result<(), FilterError> {
    let model = RegimeSwitching {
        transition: [[0.97, 0.03], [0.08, 0.92]],
        sigmas: [0.4, 2.0],
        tau: 0.05,
        prior_std: 1.0,
    };

    // Simulate regimes, baseline, and observations
    let steps = 300;
    let mut sim_rng = StdRng::seed_from_u64(11);
    let walk_noise = Normal::new(0.0, model.tau).unwrap();
    let standard = Normal::new(0.0, 1.0).unwrap();

    let mut regime = CALM;
    let mut baseline = 0.0;
    let mut observations = Vec::with_capacity(steps);
    let mut true_regimes = Vec::with_capacity(steps);
    for _ in 0..steps {
        let u: f64 = sim_rng.gen();
        regime = if u < model.transition[regime][0] {
            CALM
        } else {
            TURBULENT
        };
        baseline += walk_noise.sample(&mut sim_rng);
        observations.push(baseline + model.sigmas[regime] * standard.sample(&mut sim_rng));
        true_regimes.push(regime);
    }

    // Track P(turbulent) from the marginalized belief and E[baseline]
    let functionals: Vec<Functional> = vec![
        Box::new(|belief, _m| DMatrix::from_element(1, 1, belief[TURBULENT])),
        Box::new(|_belief, m| DMatrix::from_element(1, 1, m[0])),
    ];

    let mut engine = RbpfHmm::new(model, StratifiedResampler, 300, 4)?;
    let mut rng = StdRng::seed_from_u64(99);

    let mut total_log_like = 0.0;
    let mut correct = 0usize;
    for (t, &y) in observations.iter().enumerate() {
        engine.step(&mut rng, &dvector![y], &functionals)?;
        total_log_like += engine.log_cond_like();

        let p_turbulent = engine.expectations()[0][(0, 0)];
        let called = if p_turbulent > 0.5 { TURBULENT } else { CALM };
        if called == true_regimes[t] {
            correct += 1;
        }

        if (t + 1) % 75 == 0 {
            println!(
                "t = {:3}  P(turbulent) = {:5.3}  E[baseline] = {:7.3}  ESS = {:6.1}",
                t + 1,
                p_turbulent,
                engine.expectations()[1][(0, 0)],
                engine.effective_sample_size(),
            );
        }
    }

    println!();
    println!("total log likelihood: {:.4}", total_log_like);
    println!(
        "regime call accuracy: {:.1}%",
        100.0 * correct as f64 / steps as f64
    );
    Ok(())
}
