//! Geometric properties of the leapfrog integrator: time reversibility and
//! second-order energy conservation.

use approx::assert_abs_diff_eq;
use lattice_hmc::diagnostics::{energy_drift, fixed_duration_grid, reversibility_error};
use lattice_hmc::hmc::{Hmc, HmcConfig};
use lattice_hmc::lattice::PeriodicLattice;
use lattice_hmc::leapfrog::Leapfrog;
use lattice_hmc::potentials::{KleinGordon, SimpleHarmonicOscillator};
use ndarray::{ArrayD, IxDyn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

fn gaussian_field(shape: &[usize], rng: &mut SmallRng) -> ArrayD<f64> {
    ArrayD::from_shape_simple_fn(IxDyn(shape), || rng.sample(StandardNormal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_klein_gordon_reversibility() {
        let lattice = PeriodicLattice::new(&[2, 2, 2]).unwrap();
        let field = KleinGordon::new(lattice, 1.0, 1.0).unwrap();
        let mut rng = SmallRng::seed_from_u64(1);
        let x0 = gaussian_field(&[2, 2, 2], &mut rng);
        let p0 = gaussian_field(&[2, 2, 2], &mut rng);

        let hmc = Hmc::new(field, x0.clone(), HmcConfig::new(0.1, 100), rng).unwrap();
        let (p1, x1) = hmc.integrate(p0.clone(), x0.clone()).unwrap();
        let (p2, x2) = hmc.integrate(-p1, x1).unwrap();

        assert_abs_diff_eq!(x2, x0, epsilon = 1e-10);
        assert_abs_diff_eq!(-p2, p0, epsilon = 1e-10);

        let lf = Leapfrog::new(0.1, 100).unwrap();
        let err = reversibility_error(&hmc.potential, &lf, &p0, &x0).unwrap();
        assert!(err < 1e-10, "reversibility error {err}");
    }

    /// At fixed trajectory length the energy error falls like `ε²`: halving
    /// the step size three times must cut the mean error by well over 16.
    #[test]
    fn test_energy_drift_is_second_order() {
        const N_STARTS: usize = 50;
        let sho = SimpleHarmonicOscillator::new(1.0).unwrap();
        let grid = fixed_duration_grid(1.0, &[5, 10, 20, 40]).unwrap();
        let mut rng = SmallRng::seed_from_u64(17);

        let mut mean_drift = vec![0.0; grid.len()];
        for _ in 0..N_STARTS {
            let x = gaussian_field(&[3], &mut rng);
            let p = gaussian_field(&[3], &mut rng);
            for (acc, point) in mean_drift
                .iter_mut()
                .zip(energy_drift(&sho, &p, &x, &grid).unwrap())
            {
                *acc += point.drift / N_STARTS as f64;
            }
        }

        for pair in mean_drift.windows(2) {
            assert!(pair[0] > pair[1], "drift not decreasing: {mean_drift:?}");
        }
        let ratio = mean_drift[0] / mean_drift[3];
        assert!(ratio > 16.0, "drift ratio {ratio}, drifts {mean_drift:?}");
    }

    #[test]
    fn test_path_matches_endpoint() {
        let lattice = PeriodicLattice::new(&[3, 3]).unwrap();
        let field = KleinGordon::new(lattice, 0.5, 1.0).unwrap();
        let mut rng = SmallRng::seed_from_u64(5);
        let x0 = gaussian_field(&[3, 3], &mut rng);
        let p0 = gaussian_field(&[3, 3], &mut rng);
        let hmc = Hmc::new(field, x0.clone(), HmcConfig::new(0.2, 12), rng).unwrap();

        let (p, x, path) = hmc.integrate_with_path(p0.clone(), x0.clone()).unwrap();
        assert_eq!(path.len(), 13);
        assert_eq!(path.positions[0], x0);
        assert_eq!(path.momenta[0], p0);
        assert_eq!(path.positions[12], x);
        assert_eq!(path.momenta[12], p);
    }
}
