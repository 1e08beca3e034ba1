//! Integrator checks that run directly on a potential, without a chain.

use ndarray::NdFloat;

use crate::error::HmcError;
use crate::leapfrog::Leapfrog;
use crate::potential::{Configuration, Momentum, Potential};

/// Energy error of one trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftPoint<T> {
    pub step_size: T,
    pub n_steps: usize,
    /// `h_new − h_old`.
    pub delta_h: T,
    /// `|1 − exp(−Δh)|`.
    pub drift: T,
}

/// Integrates `(momentum, position)` once with each integrator in `grid` and
/// reports the energy error of every trajectory.
pub fn energy_drift<T, P>(
    potential: &P,
    momentum: &Momentum<T>,
    position: &Configuration<T>,
    grid: &[Leapfrog<T>],
) -> Result<Vec<DriftPoint<T>>, HmcError>
where
    T: NdFloat,
    P: Potential<T> + ?Sized,
{
    let h_old = potential.hamiltonian(momentum, position)?;
    grid.iter()
        .map(|leapfrog| {
            let (p, x) = leapfrog.integrate(momentum.clone(), position.clone(), |x| {
                potential.gradient(x)
            })?;
            let delta_h = potential.hamiltonian(&p, &x)? - h_old;
            Ok(DriftPoint {
                step_size: leapfrog.step_size(),
                n_steps: leapfrog.n_steps(),
                delta_h,
                drift: (T::one() - (-delta_h).exp()).abs(),
            })
        })
        .collect()
}

/// Integrators sharing the trajectory length `duration`, one per entry of
/// `n_steps`.
pub fn fixed_duration_grid<T: NdFloat>(
    duration: T,
    n_steps: &[usize],
) -> Result<Vec<Leapfrog<T>>, HmcError> {
    n_steps
        .iter()
        .map(|&n| {
            let steps = T::from(n).ok_or_else(|| {
                HmcError::InvalidConfig(format!("step count {n} not representable"))
            })?;
            Leapfrog::new(duration / steps, n)
        })
        .collect()
}

/// Integrates forward, flips the momentum and integrates back, returning the
/// Euclidean distance between `(−p_back, x_back)` and the starting point.
///
/// Zero up to rounding for any potential with a well-defined gradient.
pub fn reversibility_error<T, P>(
    potential: &P,
    leapfrog: &Leapfrog<T>,
    momentum: &Momentum<T>,
    position: &Configuration<T>,
) -> Result<T, HmcError>
where
    T: NdFloat,
    P: Potential<T> + ?Sized,
{
    let gradient = |x: &Configuration<T>| potential.gradient(x);
    let (p, x) = leapfrog.integrate(momentum.clone(), position.clone(), gradient)?;
    let (p_back, x_back) = leapfrog.integrate(-p, x, gradient)?;

    let dp = (&p_back + momentum).mapv(|v| v * v).sum();
    let dx = (&x_back - position).mapv(|v| v * v).sum();
    Ok((dp + dx).sqrt())
}
