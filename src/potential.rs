//! The interface between the sampler and a physical model.
//!
//! The sampler only ever talks to a model through [`Potential`]: it asks for the
//! potential energy `U(x)`, its gradient `∇U(x)`, and the kinetic energy of a
//! momentum array. The target density is `exp(-U(x))`.

use ndarray::ArrayD;
use ndarray::NdFloat;

use crate::error::PotentialError;

/// Degrees of freedom of the system, e.g. field values on a lattice.
pub type Configuration<T> = ArrayD<T>;

/// Conjugate momenta. Always the same shape as the [`Configuration`] they move.
pub type Momentum<T> = ArrayD<T>;

/// A potential-energy function together with its gradient.
///
/// Implementors provide [`potential_energy`](Potential::potential_energy) and
/// [`gradient`](Potential::gradient). The kinetic energy defaults to the
/// unit-mass form `½ Σ p²`, and [`hamiltonian`](Potential::hamiltonian) is
/// always kinetic plus potential.
///
/// # Examples
///
/// ```rust
/// use lattice_hmc::error::PotentialError;
/// use lattice_hmc::potential::Potential;
/// use ndarray::{ArrayD, IxDyn};
///
/// struct Quartic;
///
/// impl Potential<f64> for Quartic {
///     fn potential_energy(&self, x: &ArrayD<f64>) -> Result<f64, PotentialError> {
///         Ok(x.mapv(|v| v.powi(4)).sum() / 4.0)
///     }
///
///     fn gradient(&self, x: &ArrayD<f64>) -> Result<ArrayD<f64>, PotentialError> {
///         Ok(x.mapv(|v| v.powi(3)))
///     }
/// }
///
/// let x = ArrayD::from_elem(IxDyn(&[2]), 1.0);
/// let p = ArrayD::from_elem(IxDyn(&[2]), 2.0);
/// assert_eq!(Quartic.hamiltonian(&p, &x).unwrap(), 4.0 + 0.5);
/// ```
pub trait Potential<T: NdFloat> {
    /// Potential energy `U(x)`.
    fn potential_energy(&self, x: &Configuration<T>) -> Result<T, PotentialError>;

    /// Gradient `∇U(x)`, shaped like `x`.
    fn gradient(&self, x: &Configuration<T>) -> Result<Configuration<T>, PotentialError>;

    /// Kinetic energy `½ Σ p²`.
    fn kinetic_energy(&self, p: &Momentum<T>) -> T {
        let two = T::one() + T::one();
        p.fold(T::zero(), |acc, &v| acc + v * v) / two
    }

    /// Total energy `K(p) + U(x)`.
    fn hamiltonian(&self, p: &Momentum<T>, x: &Configuration<T>) -> Result<T, PotentialError> {
        Ok(self.kinetic_energy(p) + self.potential_energy(x)?)
    }
}

impl<T: NdFloat, P: Potential<T> + ?Sized> Potential<T> for &P {
    fn potential_energy(&self, x: &Configuration<T>) -> Result<T, PotentialError> {
        (**self).potential_energy(x)
    }

    fn gradient(&self, x: &Configuration<T>) -> Result<Configuration<T>, PotentialError> {
        (**self).gradient(x)
    }

    fn kinetic_energy(&self, p: &Momentum<T>) -> T {
        (**self).kinetic_energy(p)
    }

    fn hamiltonian(&self, p: &Momentum<T>, x: &Configuration<T>) -> Result<T, PotentialError> {
        (**self).hamiltonian(p, x)
    }
}
