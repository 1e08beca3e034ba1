//! Periodic hypercubic lattices.
//!
//! A [`PeriodicLattice`] describes the shape of a field configuration and the
//! torus topology on top of it: stepping off one edge re-enters on the
//! opposite one. Fields themselves stay plain `ArrayD` values so the
//! integrator can do elementwise arithmetic on them directly.

use ndarray::{ArrayD, Axis, IxDyn, NdFloat, Slice};

use crate::error::PotentialError;

/// Shape and boundary handling for a field on a periodic lattice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeriodicLattice {
    shape: Vec<usize>,
}

impl PeriodicLattice {
    /// Creates a lattice with the given extent along each axis.
    ///
    /// Every extent must be at least one site.
    pub fn new(shape: &[usize]) -> Result<Self, PotentialError> {
        if shape.is_empty() || shape.iter().any(|&n| n == 0) {
            return Err(PotentialError::InvalidParameter {
                name: "shape",
                requirement: "non-empty with every extent >= 1",
                value: format!("{:?}", shape),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of sites.
    pub fn volume(&self) -> usize {
        self.shape.iter().product()
    }

    /// Fails unless `field` has exactly this lattice's shape.
    pub fn check_shape<T>(&self, field: &ArrayD<T>) -> Result<(), PotentialError> {
        if field.shape() == self.shape.as_slice() {
            Ok(())
        } else {
            Err(PotentialError::OutOfDomain(format!(
                "field of shape {:?} on a lattice of shape {:?}",
                field.shape(),
                self.shape
            )))
        }
    }

    /// Maps an arbitrary (possibly negative or too large) index onto the torus.
    pub fn wrap(&self, index: &[isize]) -> IxDyn {
        let wrapped: Vec<usize> = index
            .iter()
            .zip(&self.shape)
            .map(|(&i, &n)| i.rem_euclid(n as isize) as usize)
            .collect();
        IxDyn(&wrapped)
    }

    /// The site `step` sites away from `index` along `axis`.
    pub fn neighbour(&self, index: &[usize], axis: usize, step: isize) -> IxDyn {
        let shifted: Vec<isize> = index
            .iter()
            .enumerate()
            .map(|(a, &i)| if a == axis { i as isize + step } else { i as isize })
            .collect();
        self.wrap(&shifted)
    }

    /// Nearest neighbours of `index`, ordered `+axis, -axis` for each axis in turn.
    pub fn neighbours(&self, index: &[usize]) -> Vec<IxDyn> {
        (0..self.ndim())
            .flat_map(|axis| {
                [
                    self.neighbour(index, axis, 1),
                    self.neighbour(index, axis, -1),
                ]
            })
            .collect()
    }

    /// Lattice laplacian `Σ_μ (φ(x+μ) + φ(x−μ) − 2φ(x)) / a²` with spacing `a`.
    pub fn laplacian<T: NdFloat>(
        &self,
        field: &ArrayD<T>,
        spacing: T,
    ) -> Result<ArrayD<T>, PotentialError> {
        self.check_shape(field)?;
        let two = T::one() + T::one();
        let mut out = ArrayD::<T>::zeros(field.raw_dim());
        for axis in 0..self.ndim() {
            out += &roll(field, axis, 1);
            out += &roll(field, axis, -1);
            out.scaled_add(-two, field);
        }
        Ok(out / (spacing * spacing))
    }
}

/// Cyclic shift along `axis`: `out[i] = field[i - shift]`, indices taken modulo
/// the axis length.
pub fn roll<T: Clone>(field: &ArrayD<T>, axis: usize, shift: isize) -> ArrayD<T> {
    let n = field.len_of(Axis(axis));
    if n == 0 {
        return field.clone();
    }
    let k = shift.rem_euclid(n as isize) as usize;
    if k == 0 {
        return field.clone();
    }
    let mut out = field.clone();
    out.slice_axis_mut(Axis(axis), Slice::from(k..))
        .assign(&field.slice_axis(Axis(axis), Slice::from(..n - k)));
    out.slice_axis_mut(Axis(axis), Slice::from(..k))
        .assign(&field.slice_axis(Axis(axis), Slice::from(n - k..)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2, Dimension};

    #[test]
    fn test_rejects_empty_extent() {
        assert!(PeriodicLattice::new(&[4, 0]).is_err());
        assert!(PeriodicLattice::new(&[]).is_err());
    }

    #[test]
    fn test_wrap_and_neighbours() {
        let lattice = PeriodicLattice::new(&[4, 3]).unwrap();
        assert_eq!(lattice.volume(), 12);
        assert_eq!(lattice.wrap(&[-1, 3]), IxDyn(&[3, 0]));
        assert_eq!(lattice.neighbour(&[0, 2], 1, 1), IxDyn(&[0, 0]));
        assert_eq!(lattice.neighbour(&[0, 2], 0, -1), IxDyn(&[3, 2]));

        let nn = lattice.neighbours(&[0, 0]);
        assert_eq!(
            nn,
            vec![
                IxDyn(&[1, 0]),
                IxDyn(&[3, 0]),
                IxDyn(&[0, 1]),
                IxDyn(&[0, 2])
            ]
        );
    }

    #[test]
    fn test_roll_matches_neighbour_lookup() {
        let field = arr2(&[[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]]).into_dyn();
        let lattice = PeriodicLattice::new(&[2, 3]).unwrap();
        let rolled = roll(&field, 1, 1);
        for (idx, v) in rolled.indexed_iter() {
            let src = lattice.neighbour(idx.slice(), 1, -1);
            assert_eq!(*v, field[&src]);
        }
        assert_eq!(roll(&field, 0, 2), field);
    }

    #[test]
    fn test_laplacian_of_constant_vanishes() {
        let lattice = PeriodicLattice::new(&[3, 3, 3]).unwrap();
        let field = ArrayD::from_elem(IxDyn(&[3, 3, 3]), 2.5);
        let lap = lattice.laplacian(&field, 0.5).unwrap();
        assert_abs_diff_eq!(lap, ArrayD::<f64>::zeros(IxDyn(&[3, 3, 3])), epsilon = 1e-12);
    }

    #[test]
    fn test_laplacian_one_dimensional() {
        let lattice = PeriodicLattice::new(&[4]).unwrap();
        let field = arr1(&[1.0, 0.0, 0.0, 0.0]).into_dyn();
        let lap = lattice.laplacian(&field, 1.0).unwrap();
        assert_eq!(lap, arr1(&[-2.0, 1.0, 0.0, 1.0]).into_dyn());
    }

    #[test]
    fn test_laplacian_checks_shape() {
        let lattice = PeriodicLattice::new(&[4]).unwrap();
        let field = ArrayD::<f64>::zeros(IxDyn(&[5]));
        assert!(matches!(
            lattice.laplacian(&field, 1.0),
            Err(PotentialError::OutOfDomain(_))
        ));
    }
}
