//! Hamiltonian (Hybrid) Monte Carlo.
//!
//! Every iteration draws a fresh standard-normal momentum, integrates
//! Hamilton's equations with the [`Leapfrog`] integrator and passes the energy
//! change to the Metropolis–Hastings test in [`AcceptReject`]. An accepted
//! proposal becomes the new state; a rejected one repeats the old state.
//!
//! The random source is consumed in a fixed order per iteration: the momentum
//! (in logical element order), then the step count if a [`StepRange`] is
//! configured, then the acceptance uniform. A fixed seed therefore reproduces
//! a chain bit for bit.
//!
//! # Examples
//!
//! ```rust
//! use lattice_hmc::hmc::{Hmc, HmcConfig};
//! use lattice_hmc::potentials::SimpleHarmonicOscillator;
//! use ndarray::{ArrayD, IxDyn};
//!
//! let potential = SimpleHarmonicOscillator::new(1.0).unwrap();
//! let initial = ArrayD::zeros(IxDyn(&[2]));
//! let config = HmcConfig::new(0.1, 20);
//!
//! let mut hmc = Hmc::new(potential, initial, config, rand::thread_rng())
//!     .unwrap();
//! let chain = hmc.sample(100, 10).unwrap();
//! assert_eq!(chain.burn_in.len(), 10);
//! assert_eq!(chain.samples.len(), 100);
//! assert_eq!(chain.len(), 111);
//! ```

use indicatif::ProgressBar;
use ndarray::{ArrayD, NdFloat};
use rand::distributions::{Distribution, Standard};
use rand::prelude::*;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

pub use crate::core::{Chain, Phase, RunOptions, Transition};
use crate::core::{run_chain, run_chain_with_progress, MarkovChain};
use crate::error::HmcError;
use crate::leapfrog::{Leapfrog, Trajectory};
use crate::metropolis::AcceptReject;
use crate::potential::{Configuration, Momentum, Potential};

/// Inclusive range from which the leapfrog step count is drawn uniformly each
/// iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepRange {
    pub min: usize,
    pub max: usize,
}

impl StepRange {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }
}

/// Sampler parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HmcConfig<T> {
    /// Leapfrog step size `ε`.
    pub step_size: T,
    /// Leapfrog steps per trajectory. Also used by [`Hmc::integrate`] when a
    /// step range is configured.
    pub n_steps: usize,
    /// Draw the step count per iteration instead of using `n_steps`.
    #[serde(default)]
    pub step_range: Option<StepRange>,
    /// Skip the Metropolis test. For studying dynamics only.
    #[serde(default)]
    pub accept_all: bool,
}

impl<T: NdFloat> HmcConfig<T> {
    pub fn new(step_size: T, n_steps: usize) -> Self {
        Self {
            step_size,
            n_steps,
            step_range: None,
            accept_all: false,
        }
    }

    pub fn with_step_range(mut self, min: usize, max: usize) -> Self {
        self.step_range = Some(StepRange::new(min, max));
        self
    }

    pub fn with_accept_all(mut self, accept_all: bool) -> Self {
        self.accept_all = accept_all;
        self
    }

    /// Checks every parameter.
    pub fn validate(&self) -> Result<(), HmcError> {
        Leapfrog::new(self.step_size, self.n_steps)?;
        if let Some(range) = self.step_range {
            if range.min == 0 || range.min > range.max {
                return Err(HmcError::InvalidConfig(format!(
                    "step_range must satisfy 1 <= min <= max, got {}..={}",
                    range.min, range.max
                )));
            }
        }
        Ok(())
    }
}

/// A single-chain HMC sampler.
///
/// # Type Parameters
///
/// * `T`: Floating-point type of the configuration.
/// * `P`: The potential defining the target density `exp(-U(x))`.
/// * `R`: Random source for momenta, step counts and the acceptance test.
#[derive(Debug, Clone)]
pub struct Hmc<T, P, R = SmallRng> {
    /// The potential providing energies and gradients.
    pub potential: P,
    config: HmcConfig<T>,
    leapfrog: Leapfrog<T>,
    acceptance: AcceptReject,
    position: Configuration<T>,
    rng: R,
    phase: Phase,
    iteration: usize,
}

impl<T, P, R> Hmc<T, P, R>
where
    T: NdFloat,
    P: Potential<T>,
    R: Rng,
    StandardNormal: Distribution<T>,
    Standard: Distribution<T>,
{
    /// Creates a sampler starting at `initial`.
    ///
    /// Fails with [`HmcError::InvalidConfig`] for a bad `config` or an empty
    /// configuration.
    pub fn new(
        potential: P,
        initial: Configuration<T>,
        config: HmcConfig<T>,
        rng: R,
    ) -> Result<Self, HmcError> {
        config.validate()?;
        if initial.is_empty() {
            return Err(HmcError::InvalidConfig(format!(
                "initial configuration of shape {:?} has no degrees of freedom",
                initial.shape()
            )));
        }
        let leapfrog = Leapfrog::new(config.step_size, config.n_steps)?;
        let acceptance = AcceptReject::new(config.accept_all);
        log::debug!(
            "HMC sampler: shape {:?}, step_size {}, n_steps {}, step_range {:?}, accept_all {}",
            initial.shape(),
            config.step_size,
            config.n_steps,
            config.step_range,
            config.accept_all
        );
        Ok(Self {
            potential,
            config,
            leapfrog,
            acceptance,
            position: initial,
            rng,
            phase: Phase::Init,
            iteration: 0,
        })
    }

    pub fn config(&self) -> &HmcConfig<T> {
        &self.config
    }

    /// The current configuration.
    pub fn position(&self) -> &Configuration<T> {
        &self.position
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of accept/reject decisions taken so far.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Runs `n_burn_in` burn-in iterations then `n_samples` sampling
    /// iterations, continuing from the current configuration.
    pub fn sample(&mut self, n_samples: usize, n_burn_in: usize) -> Result<Chain<T>, HmcError> {
        self.sample_with(n_samples, n_burn_in, RunOptions::default())
    }

    /// [`sample`](Self::sample) with explicit retention options.
    pub fn sample_with(
        &mut self,
        n_samples: usize,
        n_burn_in: usize,
        options: RunOptions,
    ) -> Result<Chain<T>, HmcError> {
        self.ensure_usable()?;
        run_chain(self, n_samples, n_burn_in, &options, None)
    }

    /// [`sample`](Self::sample) with a progress bar showing the acceptance rate
    /// over a sliding window of 100 iterations.
    pub fn sample_progress(
        &mut self,
        n_samples: usize,
        n_burn_in: usize,
    ) -> Result<Chain<T>, HmcError> {
        self.ensure_usable()?;
        run_chain_with_progress(self, n_samples, n_burn_in, &RunOptions::default(), "HMC")
    }

    /// Like [`sample_progress`](Self::sample_progress) but drawing into a
    /// caller-owned bar.
    pub fn sample_with_bar(
        &mut self,
        n_samples: usize,
        n_burn_in: usize,
        options: RunOptions,
        pb: &ProgressBar,
    ) -> Result<Chain<T>, HmcError> {
        self.ensure_usable()?;
        run_chain(self, n_samples, n_burn_in, &options, Some(pb))
    }

    /// One leapfrog trajectory from `(momentum, configuration)` with the
    /// configured step size and `n_steps`. Touches neither the chain nor the
    /// random source.
    pub fn integrate(
        &self,
        momentum: Momentum<T>,
        configuration: Configuration<T>,
    ) -> Result<(Momentum<T>, Configuration<T>), HmcError> {
        self.leapfrog
            .integrate(momentum, configuration, |x| self.potential.gradient(x))
    }

    /// [`integrate`](Self::integrate), also returning the full trajectory.
    pub fn integrate_with_path(
        &self,
        momentum: Momentum<T>,
        configuration: Configuration<T>,
    ) -> Result<(Momentum<T>, Configuration<T>, Trajectory<T>), HmcError> {
        self.leapfrog
            .integrate_with_path(momentum, configuration, |x| self.potential.gradient(x))
    }

    fn ensure_usable(&self) -> Result<(), HmcError> {
        if self.phase == Phase::Aborted {
            Err(HmcError::Aborted)
        } else {
            Ok(())
        }
    }

    fn draw_momentum(&mut self) -> Momentum<T> {
        let rng = &mut self.rng;
        ArrayD::from_shape_simple_fn(self.position.raw_dim(), || rng.sample(StandardNormal))
    }

    fn draw_leapfrog(&mut self) -> Result<Leapfrog<T>, HmcError> {
        match self.config.step_range {
            Some(range) => {
                let n_steps = self.rng.gen_range(range.min..=range.max);
                Leapfrog::new(self.config.step_size, n_steps)
            }
            None => Ok(self.leapfrog),
        }
    }

    fn transition(&mut self, save_path: bool) -> Result<Transition<T>, HmcError> {
        let p0 = self.draw_momentum();
        let leapfrog = self.draw_leapfrog()?;

        let h_old = self.potential.hamiltonian(&p0, &self.position)?;
        let gradient = |x: &Configuration<T>| self.potential.gradient(x);
        let (p1, x1, path) = if save_path {
            let (p, x, path) = leapfrog.integrate_with_path(p0, self.position.clone(), gradient)?;
            (p, x, Some(path))
        } else {
            let (p, x) = leapfrog.integrate(p0, self.position.clone(), gradient)?;
            (p, x, None)
        };
        let h_new = self.potential.hamiltonian(&p1, &x1)?;

        if !(h_old.is_finite() && h_new.is_finite()) {
            log::warn!(
                "non-finite hamiltonian at iteration {}: h_old = {}, h_new = {}",
                self.iteration,
                h_old,
                h_new
            );
            return Err(HmcError::NonFiniteHamiltonian {
                iteration: self.iteration,
                h_old: h_old.to_f64().unwrap_or(f64::NAN),
                h_new: h_new.to_f64().unwrap_or(f64::NAN),
            });
        }

        let decision = self.acceptance.decide(h_old, h_new, &mut self.rng);
        log::trace!(
            "iteration {}: dH = {}, p = {}, accepted = {}",
            self.iteration,
            decision.delta_h,
            decision.probability,
            decision.accepted
        );
        if decision.accepted {
            self.position = x1;
        }
        self.iteration += 1;

        Ok(Transition {
            decision,
            n_steps: leapfrog.n_steps(),
            path,
        })
    }
}

impl<T, P> Hmc<T, P, SmallRng>
where
    T: NdFloat,
    P: Potential<T>,
{
    /// Reseeds the random source.
    ///
    /// This method ensures reproducibility across runs.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }
}

impl<T, P, R> MarkovChain<T> for Hmc<T, P, R>
where
    T: NdFloat,
    P: Potential<T>,
    R: Rng,
    StandardNormal: Distribution<T>,
    Standard: Distribution<T>,
{
    fn step(&mut self, save_path: bool) -> Result<Transition<T>, HmcError> {
        self.ensure_usable()?;
        let result = self.transition(save_path);
        if result.is_err() {
            self.phase = Phase::Aborted;
        }
        result
    }

    fn current_state(&self) -> &ArrayD<T> {
        &self.position
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != Phase::Aborted {
            self.phase = phase;
        }
    }
}
