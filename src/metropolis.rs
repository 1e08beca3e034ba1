/*!
# Metropolis–Hastings accept/reject

Corrects the integration error of a leapfrog proposal so that the chain keeps
exactly the target density. A proposal moving the Hamiltonian from `h_old` to
`h_new` is accepted with probability `min(1, exp(h_old − h_new))`.

The test is evaluated as `exp(h_old − h_new) − u ≥ 0` with `u` uniform in
`[0, 1)`. This is the textbook `u < min(1, exp(−Δh))` without the `min`: any
value of `exp(−Δh)` at or above one accepts, and a very large `Δh`
underflows to zero, which rejects.

[`AcceptReject`] itself keeps no history. Diagnostics for a run are collected
into an [`AcceptanceRecord`] owned by that run.
*/

use ndarray::{Array1, NdFloat};
use ndarray_stats::QuantileExt;
use num_traits::{Float, FromPrimitive};
use rand::distributions::{Distribution, Standard};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Outcome of one accept/reject test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision<T> {
    pub accepted: bool,
    /// `min(1, exp(−Δh))`.
    pub probability: T,
    /// `h_new − h_old`.
    pub delta_h: T,
    pub h_old: T,
    pub h_new: T,
}

/// The accept/reject rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptReject {
    /// Accept every proposal without drawing a random number. Only useful for
    /// studying the raw dynamics; the resulting chain is not a valid sample.
    pub accept_all: bool,
}

impl AcceptReject {
    pub fn new(accept_all: bool) -> Self {
        Self { accept_all }
    }

    /// Decides on a proposal that moved the Hamiltonian from `h_old` to `h_new`.
    ///
    /// Draws exactly one uniform from `rng` unless `accept_all` is set, in
    /// which case `rng` is untouched.
    pub fn decide<T, R>(&self, h_old: T, h_new: T, rng: &mut R) -> Decision<T>
    where
        T: Float,
        R: Rng + ?Sized,
        Standard: Distribution<T>,
    {
        let delta_h = h_new - h_old;
        let boltzmann = (h_old - h_new).exp();
        let accepted = if self.accept_all {
            true
        } else {
            let u: T = rng.gen();
            boltzmann - u >= T::zero()
        };
        Decision {
            accepted,
            probability: boltzmann.min(T::one()),
            delta_h,
            h_old,
            h_new,
        }
    }
}

/// Per-run accept/reject diagnostics stored as parallel columns, one entry per
/// decision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcceptanceRecord<T> {
    pub probabilities: Vec<T>,
    pub accepted: Vec<bool>,
    pub delta_h: Vec<T>,
    pub h_old: Vec<T>,
    pub h_new: Vec<T>,
    /// Leapfrog steps used for each trajectory.
    pub n_steps: Vec<usize>,
}

impl<T: Copy> AcceptanceRecord<T> {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            probabilities: Vec::with_capacity(n),
            accepted: Vec::with_capacity(n),
            delta_h: Vec::with_capacity(n),
            h_old: Vec::with_capacity(n),
            h_new: Vec::with_capacity(n),
            n_steps: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, decision: &Decision<T>, n_steps: usize) {
        self.probabilities.push(decision.probability);
        self.accepted.push(decision.accepted);
        self.delta_h.push(decision.delta_h);
        self.h_old.push(decision.h_old);
        self.h_new.push(decision.h_new);
        self.n_steps.push(n_steps);
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

impl<T: NdFloat + FromPrimitive> AcceptanceRecord<T> {
    /// Fraction of accepted proposals.
    pub fn acceptance_rate(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        let n_accepted = self.accepted.iter().filter(|&&a| a).count();
        Some(n_accepted as f64 / self.len() as f64)
    }

    /// Mean of `min(1, exp(−Δh))`.
    pub fn mean_probability(&self) -> Option<T> {
        Array1::from(self.probabilities.clone()).mean()
    }

    /// `⟨exp(−Δh)⟩`, which equals one for an exact, reversible, area-preserving
    /// integrator in equilibrium.
    pub fn mean_exp_neg_delta_h(&self) -> Option<T> {
        Array1::from(self.delta_h.clone()).mapv(|d| (-d).exp()).mean()
    }

    /// Largest `|Δh|`, or `None` when empty or when a NaN is present.
    pub fn max_abs_delta_h(&self) -> Option<T> {
        let abs = Array1::from(self.delta_h.clone()).mapv(|d| d.abs());
        abs.max().ok().copied()
    }
}
