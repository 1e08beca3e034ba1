/*!
Reference potentials for exercising the sampler.

- [`SimpleHarmonicOscillator`]: `U(x) = ½ k Σ x²`, an independent Gaussian of
  variance `1/k` in every component.
- [`MultivariateGaussian`]: `U(x) = ½ (x − μ)ᵀ Σ⁻¹ (x − μ)` for a correlated
  Gaussian with mean `μ` and covariance `Σ`.
- [`KleinGordon`]: the Euclidean free scalar field on a periodic lattice,
  `U(φ) = a^d Σ_x [ ½ Σ_μ ((φ(x+μ) − φ(x)) / a)² + ½ m² φ(x)² ]`.

# Examples

```rust
use lattice_hmc::potential::Potential;
use lattice_hmc::potentials::SimpleHarmonicOscillator;
use ndarray::arr1;

let sho = SimpleHarmonicOscillator::new(2.0).unwrap();
let x = arr1(&[1.0, -1.0]).into_dyn();
assert_eq!(sho.potential_energy(&x).unwrap(), 2.0);
assert_eq!(sho.gradient(&x).unwrap(), arr1(&[2.0, -2.0]).into_dyn());
```
*/

use ndarray::{Array1, Array2, ArrayD, Ix1, NdFloat};

use crate::error::PotentialError;
use crate::lattice::{roll, PeriodicLattice};
use crate::potential::{Configuration, Potential};

fn require_positive<T: NdFloat>(name: &'static str, value: T) -> Result<T, PotentialError> {
    if value > T::zero() && value.is_finite() {
        Ok(value)
    } else {
        Err(PotentialError::InvalidParameter {
            name,
            requirement: "positive and finite",
            value: format!("{}", value),
        })
    }
}

/// Uncoupled harmonic wells `U(x) = ½ k Σ x²` with spring constant `k`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleHarmonicOscillator<T> {
    k: T,
}

impl<T: NdFloat> SimpleHarmonicOscillator<T> {
    pub fn new(k: T) -> Result<Self, PotentialError> {
        Ok(Self {
            k: require_positive("k", k)?,
        })
    }

    pub fn k(&self) -> T {
        self.k
    }

    /// Stationary variance `1/k` of every component.
    pub fn variance(&self) -> T {
        T::one() / self.k
    }
}

impl<T: NdFloat> Potential<T> for SimpleHarmonicOscillator<T> {
    fn potential_energy(&self, x: &Configuration<T>) -> Result<T, PotentialError> {
        let two = T::one() + T::one();
        Ok(self.k * x.fold(T::zero(), |acc, &v| acc + v * v) / two)
    }

    fn gradient(&self, x: &Configuration<T>) -> Result<Configuration<T>, PotentialError> {
        Ok(x * self.k)
    }
}

/// Lower Cholesky factor of a symmetric matrix, `None` unless positive definite.
fn cholesky<T: NdFloat>(a: &Array2<T>) -> Option<Array2<T>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));
    for j in 0..n {
        let mut d = a[[j, j]];
        for k in 0..j {
            d -= l[[j, k]] * l[[j, k]];
        }
        if !(d > T::zero() && d.is_finite()) {
            return None;
        }
        let pivot = d.sqrt();
        l[[j, j]] = pivot;
        for i in j + 1..n {
            let mut s = a[[i, j]];
            for k in 0..j {
                s -= l[[i, k]] * l[[j, k]];
            }
            l[[i, j]] = s / pivot;
        }
    }
    Some(l)
}

/// Inverse of a lower-triangular matrix with non-zero diagonal.
fn lower_triangular_inverse<T: NdFloat>(l: &Array2<T>) -> Array2<T> {
    let n = l.nrows();
    let mut inv = Array2::zeros((n, n));
    for c in 0..n {
        for i in c..n {
            let mut s = if i == c { T::one() } else { T::zero() };
            for k in c..i {
                s -= l[[i, k]] * inv[[k, c]];
            }
            inv[[i, c]] = s / l[[i, i]];
        }
    }
    inv
}

/// Correlated Gaussian over a one-dimensional configuration of length `n`.
///
/// The gradient is `Σ⁻¹ (x − μ)`. The precision matrix is computed once, at
/// construction, from the Cholesky factor of the covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct MultivariateGaussian<T> {
    mean: Array1<T>,
    covariance: Array2<T>,
    precision: Array2<T>,
}

impl<T: NdFloat> MultivariateGaussian<T> {
    /// `covariance` must be an `n × n` symmetric positive-definite matrix,
    /// where `n = mean.len() >= 1`.
    pub fn new(mean: Array1<T>, covariance: Array2<T>) -> Result<Self, PotentialError> {
        let n = mean.len();
        if n == 0 || covariance.dim() != (n, n) {
            return Err(PotentialError::InvalidParameter {
                name: "covariance",
                requirement: "square with the mean's length",
                value: format!("shape {:?} for a mean of length {}", covariance.shape(), n),
            });
        }
        if mean.iter().any(|v| !v.is_finite()) {
            return Err(PotentialError::InvalidParameter {
                name: "mean",
                requirement: "finite",
                value: format!("{}", mean),
            });
        }
        if covariance != covariance.t() {
            return Err(PotentialError::InvalidParameter {
                name: "covariance",
                requirement: "symmetric",
                value: format!("{}", covariance),
            });
        }
        let lower = cholesky(&covariance).ok_or_else(|| PotentialError::InvalidParameter {
            name: "covariance",
            requirement: "positive definite",
            value: format!("{}", covariance),
        })?;
        let inv = lower_triangular_inverse(&lower);
        let precision = inv.t().dot(&inv);
        Ok(Self {
            mean,
            covariance,
            precision,
        })
    }

    pub fn mean(&self) -> &Array1<T> {
        &self.mean
    }

    pub fn covariance(&self) -> &Array2<T> {
        &self.covariance
    }

    /// `Σ⁻¹`.
    pub fn precision(&self) -> &Array2<T> {
        &self.precision
    }

    fn centred(&self, x: &Configuration<T>) -> Result<Array1<T>, PotentialError> {
        if x.shape() != [self.mean.len()].as_slice() {
            return Err(PotentialError::OutOfDomain(format!(
                "configuration of shape {:?} for a {}-dimensional Gaussian",
                x.shape(),
                self.mean.len()
            )));
        }
        let x = x
            .view()
            .into_dimensionality::<Ix1>()
            .map_err(|e| PotentialError::OutOfDomain(e.to_string()))?;
        Ok(&x - &self.mean)
    }
}

impl<T: NdFloat> Potential<T> for MultivariateGaussian<T> {
    fn potential_energy(&self, x: &Configuration<T>) -> Result<T, PotentialError> {
        let d = self.centred(x)?;
        let two = T::one() + T::one();
        Ok(d.dot(&self.precision.dot(&d)) / two)
    }

    fn gradient(&self, x: &Configuration<T>) -> Result<Configuration<T>, PotentialError> {
        let d = self.centred(x)?;
        Ok(self.precision.dot(&d).into_dyn())
    }
}

/// Free scalar field of mass `m` on a periodic lattice with spacing `a`.
#[derive(Debug, Clone, PartialEq)]
pub struct KleinGordon<T> {
    mass: T,
    spacing: T,
    lattice: PeriodicLattice,
}

impl<T: NdFloat> KleinGordon<T> {
    /// A zero mass leaves the constant mode unbounded, so `mass` must be positive.
    pub fn new(lattice: PeriodicLattice, mass: T, spacing: T) -> Result<Self, PotentialError> {
        Ok(Self {
            mass: require_positive("mass", mass)?,
            spacing: require_positive("spacing", spacing)?,
            lattice,
        })
    }

    pub fn lattice(&self) -> &PeriodicLattice {
        &self.lattice
    }

    pub fn mass(&self) -> T {
        self.mass
    }

    pub fn spacing(&self) -> T {
        self.spacing
    }

    /// Volume element `a^d`.
    fn measure(&self) -> T {
        (0..self.lattice.ndim()).fold(T::one(), |acc, _| acc * self.spacing)
    }
}

impl<T: NdFloat> Potential<T> for KleinGordon<T> {
    fn potential_energy(&self, phi: &Configuration<T>) -> Result<T, PotentialError> {
        self.lattice.check_shape(phi)?;
        let two = T::one() + T::one();
        let a2 = self.spacing * self.spacing;
        let mut kinetic = T::zero();
        for axis in 0..self.lattice.ndim() {
            let forward = roll(phi, axis, -1);
            kinetic = kinetic
                + ndarray::Zip::from(&forward)
                    .and(phi)
                    .fold(T::zero(), |acc, &f, &p| acc + (f - p) * (f - p));
        }
        let m2 = self.mass * self.mass;
        let mass_term = phi.fold(T::zero(), |acc, &v| acc + v * v) * m2;
        Ok(self.measure() * (kinetic / a2 + mass_term) / two)
    }

    fn gradient(&self, phi: &Configuration<T>) -> Result<Configuration<T>, PotentialError> {
        let laplacian = self.lattice.laplacian(phi, self.spacing)?;
        let m2 = self.mass * self.mass;
        let grad: ArrayD<T> = phi * m2 - laplacian;
        Ok(grad * self.measure())
    }
}
