//! Symplectic leapfrog integration of Hamilton's equations.
//!
//! With `H(p, x) = ½ Σ p² + U(x)` one trajectory of `N` steps of size `ε` is
//!
//! ```text
//! p ← p − (ε/2) ∇U(x)
//! repeat N − 1 times:  x ← x + ε p,  p ← p − ε ∇U(x)
//! x ← x + ε p,  p ← p − (ε/2) ∇U(x)
//! ```
//!
//! The map is volume preserving and time reversible: integrating `(−p', x')`
//! with the same `(ε, N)` lands on `(−p, x)`. The energy error is `O(ε²)`.

use ndarray::{ArrayD, NdFloat};

use crate::error::{HmcError, PotentialError};
use crate::potential::{Configuration, Momentum};

/// Every intermediate phase-space point of one trajectory.
///
/// Holds `n_steps + 1` entries: the starting point, then the state after each
/// position update together with the momentum that follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory<T> {
    pub momenta: Vec<Momentum<T>>,
    pub positions: Vec<Configuration<T>>,
}

impl<T> Trajectory<T> {
    fn with_capacity(n: usize) -> Self {
        Self {
            momenta: Vec::with_capacity(n),
            positions: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Leapfrog integrator with a fixed step size and step count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leapfrog<T> {
    step_size: T,
    n_steps: usize,
}

impl<T: NdFloat> Leapfrog<T> {
    /// Requires a finite `step_size > 0` and `n_steps >= 1`.
    pub fn new(step_size: T, n_steps: usize) -> Result<Self, HmcError> {
        if !(step_size > T::zero() && step_size.is_finite()) {
            return Err(HmcError::InvalidConfig(format!(
                "step_size must be positive and finite, got {}",
                step_size
            )));
        }
        if n_steps == 0 {
            return Err(HmcError::InvalidConfig(
                "n_steps must be at least 1".to_string(),
            ));
        }
        Ok(Self { step_size, n_steps })
    }

    pub fn step_size(&self) -> T {
        self.step_size
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Trajectory length `N·ε`.
    pub fn duration(&self) -> T {
        self.step_size * T::from(self.n_steps).unwrap_or_else(T::infinity)
    }

    /// Integrates `(momentum, position)` forward and returns the end point.
    ///
    /// `gradient` evaluates `∇U`; its errors are returned unchanged inside
    /// [`HmcError::Potential`] and are never retried.
    pub fn integrate<F>(
        &self,
        momentum: Momentum<T>,
        position: Configuration<T>,
        gradient: F,
    ) -> Result<(Momentum<T>, Configuration<T>), HmcError>
    where
        F: FnMut(&Configuration<T>) -> Result<Configuration<T>, PotentialError>,
    {
        self.run(momentum, position, gradient, None)
    }

    /// Like [`integrate`](Self::integrate), but also returns every intermediate
    /// point. The end point is bit-identical to the one `integrate` returns.
    pub fn integrate_with_path<F>(
        &self,
        momentum: Momentum<T>,
        position: Configuration<T>,
        gradient: F,
    ) -> Result<(Momentum<T>, Configuration<T>, Trajectory<T>), HmcError>
    where
        F: FnMut(&Configuration<T>) -> Result<Configuration<T>, PotentialError>,
    {
        let mut path = Trajectory::with_capacity(self.n_steps + 1);
        let (p, x) = self.run(momentum, position, gradient, Some(&mut path))?;
        Ok((p, x, path))
    }

    fn run<F>(
        &self,
        mut p: Momentum<T>,
        mut x: Configuration<T>,
        mut gradient: F,
        mut path: Option<&mut Trajectory<T>>,
    ) -> Result<(Momentum<T>, Configuration<T>), HmcError>
    where
        F: FnMut(&Configuration<T>) -> Result<Configuration<T>, PotentialError>,
    {
        if p.shape() != x.shape() {
            return Err(HmcError::shape_mismatch(x.shape(), p.shape()));
        }
        let mut grad = |x: &ArrayD<T>| -> Result<ArrayD<T>, HmcError> {
            let g = gradient(x)?;
            if g.shape() != x.shape() {
                return Err(HmcError::shape_mismatch(x.shape(), g.shape()));
            }
            Ok(g)
        };

        let eps = self.step_size;
        let half_eps = eps / (T::one() + T::one());

        if let Some(path) = path.as_deref_mut() {
            path.momenta.push(p.clone());
            path.positions.push(x.clone());
        }

        p.scaled_add(-half_eps, &grad(&x)?);
        for step in 0..self.n_steps {
            x.scaled_add(eps, &p);
            let g = grad(&x)?;
            if step + 1 < self.n_steps {
                p.scaled_add(-eps, &g);
            } else {
                p.scaled_add(-half_eps, &g);
            }
            if let Some(path) = path.as_deref_mut() {
                path.momenta.push(p.clone());
                path.positions.push(x.clone());
            }
        }
        Ok((p, x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, IxDyn};

    fn spring(x: &ArrayD<f64>) -> Result<ArrayD<f64>, PotentialError> {
        Ok(x.clone())
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(Leapfrog::new(0.0, 10).is_err());
        assert!(Leapfrog::new(-0.1, 10).is_err());
        assert!(Leapfrog::new(f64::INFINITY, 10).is_err());
        assert!(Leapfrog::new(f64::NAN, 10).is_err());
        assert!(Leapfrog::new(0.1, 0).is_err());
        let lf = Leapfrog::new(0.1, 20).unwrap();
        assert_abs_diff_eq!(lf.duration(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_step_by_hand() {
        // Unit spring, ε = 0.5, one step starting at (p, x) = (1, 0).
        let lf = Leapfrog::new(0.5, 1).unwrap();
        let (p, x) = lf
            .integrate(arr1(&[1.0]).into_dyn(), arr1(&[0.0]).into_dyn(), spring)
            .unwrap();
        // p_half = 1, x = 0.5, p = 1 - 0.25 * 0.5
        assert_abs_diff_eq!(x[[0]], 0.5);
        assert_abs_diff_eq!(p[[0]], 0.875);
    }

    #[test]
    fn test_counts_gradient_evaluations() {
        let lf = Leapfrog::new(0.1, 7).unwrap();
        let mut calls = 0;
        let x0 = ArrayD::from_elem(IxDyn(&[2, 2]), 0.3);
        let p0 = ArrayD::from_elem(IxDyn(&[2, 2]), -0.2);
        lf.integrate(p0, x0, |x: &ArrayD<f64>| {
            calls += 1;
            Ok(x.clone())
        })
        .unwrap();
        assert_eq!(calls, 8);
    }

    #[test]
    fn test_path_is_observational() {
        let lf = Leapfrog::new(0.13, 25).unwrap();
        let x0 = arr1(&[0.4, -1.1, 2.0]).into_dyn();
        let p0 = arr1(&[1.0, 0.5, -0.7]).into_dyn();

        let (p, x) = lf.integrate(p0.clone(), x0.clone(), spring).unwrap();
        let (p_path, x_path, path) = lf
            .integrate_with_path(p0.clone(), x0.clone(), spring)
            .unwrap();

        assert_eq!(p, p_path);
        assert_eq!(x, x_path);
        assert_eq!(path.len(), 26);
        assert_eq!(path.momenta[0], p0);
        assert_eq!(path.positions[0], x0);
        assert_eq!(path.momenta[25], p);
        assert_eq!(path.positions[25], x);
    }

    #[test]
    fn test_momentum_shape_mismatch() {
        let lf = Leapfrog::new(0.1, 3).unwrap();
        let err = lf
            .integrate(
                ArrayD::zeros(IxDyn(&[3])),
                ArrayD::zeros(IxDyn(&[2])),
                spring,
            )
            .unwrap_err();
        assert!(matches!(err, HmcError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_gradient_shape_mismatch() {
        let lf = Leapfrog::new(0.1, 3).unwrap();
        let err = lf
            .integrate(
                ArrayD::zeros(IxDyn(&[2])),
                ArrayD::zeros(IxDyn(&[2])),
                |_: &ArrayD<f64>| Ok(ArrayD::zeros(IxDyn(&[4]))),
            )
            .unwrap_err();
        match err {
            HmcError::ShapeMismatch { expected, found } => {
                assert_eq!(expected, vec![2]);
                assert_eq!(found, vec![4]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_gradient_failure_propagates() {
        let lf = Leapfrog::new(0.5, 10).unwrap();
        let err = lf
            .integrate(
                arr1(&[3.0]).into_dyn(),
                arr1(&[0.0]).into_dyn(),
                |x: &ArrayD<f64>| {
                    if x[[0]].abs() > 1.0 {
                        Err(PotentialError::OutOfDomain(format!("x = {}", x[[0]])))
                    } else {
                        Ok(x.clone())
                    }
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            HmcError::Potential(PotentialError::OutOfDomain(_))
        ));
    }
}
