//! Error types for the sampler and its potential collaborators.

use thiserror::Error;

/// Failures raised by a [`Potential`](crate::potential::Potential) or by the
/// lattice it lives on.
#[derive(Debug, Error)]
pub enum PotentialError {
    /// The configuration lies outside the region where the potential is defined.
    #[error("configuration outside the potential's domain: {0}")]
    OutOfDomain(String),

    /// A constructor parameter violates its precondition.
    #[error("parameter `{name}` must be {requirement}, got {value}")]
    InvalidParameter {
        name: &'static str,
        requirement: &'static str,
        value: String,
    },

    /// Anything else a user-supplied potential wants to report.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors that abort an HMC run.
#[derive(Debug, Error)]
pub enum HmcError {
    /// A sampler or integrator parameter is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two arrays that must share a shape do not.
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// The Hamiltonian at the start or end of a trajectory is NaN or infinite.
    #[error("non-finite hamiltonian at iteration {iteration}: h_old = {h_old}, h_new = {h_new}")]
    NonFiniteHamiltonian {
        iteration: usize,
        h_old: f64,
        h_new: f64,
    },

    /// The potential failed; the inner error is passed through untouched.
    #[error(transparent)]
    Potential(#[from] PotentialError),

    /// An earlier error aborted this sampler.
    #[error("sampler aborted by an earlier error; construct a fresh sampler to restart")]
    Aborted,

    #[error("invalid progress bar template: {0}")]
    Progress(#[from] indicatif::style::TemplateError),
}

impl HmcError {
    pub(crate) fn shape_mismatch(expected: &[usize], found: &[usize]) -> Self {
        HmcError::ShapeMismatch {
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}
