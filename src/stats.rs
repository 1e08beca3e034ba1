//! Summary statistics over sampled configurations.

use ndarray::prelude::*;
use ndarray::NdFloat;
use num_traits::FromPrimitive;
use std::collections::VecDeque;

use crate::error::HmcError;

/// Acceptance rate over the most recent `capacity` decisions.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptanceWindow {
    capacity: usize,
    n_accepted: usize,
    queue: VecDeque<bool>,
}

impl AcceptanceWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            n_accepted: 0,
            queue: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, accepted: bool) {
        if self.queue.len() == self.capacity {
            if let Some(true) = self.queue.pop_front() {
                self.n_accepted -= 1;
            }
        }
        self.queue.push_back(accepted);
        if accepted {
            self.n_accepted += 1;
        }
    }

    /// Fraction accepted, `0` before the first decision.
    pub fn rate(&self) -> f32 {
        if self.queue.is_empty() {
            0.0
        } else {
            self.n_accepted as f32 / self.queue.len() as f32
        }
    }
}

impl Default for AcceptanceWindow {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Elementwise sample mean and (biased) variance over a set of configurations.
///
/// Returns `Ok(None)` for an empty slice and an error when the configurations
/// do not all share one shape.
pub fn moments<T>(samples: &[ArrayD<T>]) -> Result<Option<(ArrayD<T>, ArrayD<T>)>, HmcError>
where
    T: NdFloat + FromPrimitive,
{
    let Some(first) = samples.first() else {
        return Ok(None);
    };
    if let Some(bad) = samples.iter().find(|s| s.shape() != first.shape()) {
        return Err(HmcError::shape_mismatch(first.shape(), bad.shape()));
    }
    let views: Vec<ArrayViewD<T>> = samples.iter().map(|s| s.view()).collect();
    let stacked = ndarray::stack(Axis(0), &views)
        .map_err(|e| HmcError::InvalidConfig(format!("cannot stack samples: {e}")))?;
    let mean = stacked
        .mean_axis(Axis(0))
        .ok_or_else(|| HmcError::InvalidConfig("no samples to average".to_string()))?;
    let var = stacked.var_axis(Axis(0), T::zero());
    Ok(Some((mean, var)))
}

/// Mean and (biased) variance of every component of every sample pooled
/// together; useful when all sites are statistically equivalent.
pub fn pooled_moments<T>(samples: &[ArrayD<T>]) -> Option<(T, T)>
where
    T: NdFloat + FromPrimitive,
{
    let n: usize = samples.iter().map(|s| s.len()).sum();
    if n == 0 {
        return None;
    }
    let n = T::from_usize(n)?;
    let sum = samples.iter().fold(T::zero(), |acc, s| acc + s.sum());
    let mean = sum / n;
    let ss = samples.iter().fold(T::zero(), |acc, s| {
        acc + s.fold(T::zero(), |a, &v| a + (v - mean) * (v - mean))
    });
    Some((mean, ss / n))
}
