use lattice_hmc::hmc::{Hmc, HmcConfig, RunOptions};
use lattice_hmc::potentials::SimpleHarmonicOscillator;
use lattice_hmc::stats;
use ndarray::{ArrayD, IxDyn};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    // U(x) = ½ k Σ x², so every coordinate is N(0, 1/k).
    let k = 2.0;
    let target = SimpleHarmonicOscillator::new(k)?;

    // Start well away from the mode so burn-in has something to do.
    let initial = ArrayD::from_elem(IxDyn(&[3]), 4.0);

    // Trajectory length N·ε = 1.5, roughly a quarter period for k = 2.
    let config = HmcConfig::new(0.1, 15);
    let mut sampler = Hmc::new(target, initial, config, SmallRng::from_entropy())?.set_seed(42);

    let chain = sampler.sample_progress(20_000, 1_000)?;
    let (mean, var) = stats::moments(&chain.samples)?.ok_or("no samples")?;
    println!("mean:     {mean}");
    println!("variance: {var} (exact {})", 1.0 / k);

    // A short run keeping the acceptance record and the trajectories.
    let chain = sampler.sample_with(
        5,
        0,
        RunOptions {
            save_paths: true,
            record_acceptance: true,
        },
    )?;
    if let (Some(record), Some(paths)) = (chain.acceptance, chain.paths) {
        for (i, path) in paths.iter().enumerate() {
            println!(
                "trajectory {i}: {} points, ΔH = {:+.2e}, accepted = {}",
                path.len(),
                record.delta_h[i],
                record.accepted[i]
            );
        }
    }

    Ok(())
}
