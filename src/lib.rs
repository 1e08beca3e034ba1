//! Hamiltonian Monte Carlo for fields on periodic lattices.

pub mod core;
pub mod diagnostics;
pub mod error;
pub mod hmc;
pub mod lattice;
pub mod leapfrog;
pub mod metropolis;
pub mod potential;
pub mod potentials;
pub mod stats;
